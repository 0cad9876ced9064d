//! Prompt text sent to the model

use crate::suite::TestCase;

/// Substring that marks a text block as carrying the verdict
pub const VERDICT_MARKER: &str = "test_passed";

pub const SYSTEM_PROMPT: &str = r#"You are a senior QA engineer exercising a web application in a Chrome browser.
Each request gives you one test instruction. Carry it out against the page and decide whether the application behaves as described.

A request looks like this:

<input>Verify that the user can log in with valid credentials</input>
<payload>{"username": "admin", "password": "password"}</payload>

The payload is optional test data to use while following the instruction.

Rules:
1. You can only reach the browser through the computer tool (screenshot, mouse_move, left_click, type).
2. The browser is already open on the application; do not open another one.
3. Let every action finish before asking for a screenshot.
4. To click, first move the mouse to the element's x,y coordinates, then left_click.
5. Never use the address bar. Stay on the page and interact only with its elements.

When you are done, reply with JSON only, using the schema {"test_passed": boolean, "motivation": string}.
Do not add any other text. Make sure the JSON is valid.
"#;

/// First user turn for a test case
pub fn format_instruction(case: &TestCase) -> String {
    match &case.payload {
        Some(payload) => format!(
            "<input>{}</input>\n<payload>{}</payload>",
            case.instruction, payload
        ),
        None => case.instruction.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_instruction_passes_through() {
        let case = TestCase::new("Verify the home page loads");
        assert_eq!(format_instruction(&case), "Verify the home page loads");
    }

    #[test]
    fn test_payload_is_wrapped() {
        let case = TestCase::with_payload("Log in", json!({"username": "admin"}));
        assert_eq!(
            format_instruction(&case),
            "<input>Log in</input>\n<payload>{\"username\":\"admin\"}</payload>"
        );
    }

    #[test]
    fn test_system_prompt_names_verdict_schema() {
        assert!(SYSTEM_PROMPT.contains(VERDICT_MARKER));
    }
}
