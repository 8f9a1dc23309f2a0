use relay_shared::{ChatMessage, MessageRole};

const SYSTEM_LABEL: &str = "System: ";
const HUMAN_LABEL: &str = "Human: ";
const ASSISTANT_LABEL: &str = "Assistant: ";

/// Flattens a conversation into a single completion prompt.
///
/// Assistant turns are labelled `Assistant:`, every other role `Human:`. The
/// prompt always ends with an empty assistant turn for the model to continue.
pub fn format_prompt(messages: &[ChatMessage], system_prompt: Option<&str>) -> String {
    let mut prompt = String::new();

    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        prompt.push_str(SYSTEM_LABEL);
        prompt.push_str(system);
        prompt.push_str("\n\n");
    }

    for msg in messages {
        let label = match msg.role {
            MessageRole::Assistant => ASSISTANT_LABEL,
            _ => HUMAN_LABEL,
        };
        prompt.push_str(label);
        prompt.push_str(&msg.content);
        prompt.push('\n');
    }

    prompt.push_str(ASSISTANT_LABEL);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: MessageRole, content: &str) -> ChatMessage {
        ChatMessage {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn single_user_turn() {
        let prompt = format_prompt(&[msg(MessageRole::User, "Hi")], None);
        assert_eq!(prompt, "Human: Hi\nAssistant: ");
    }

    #[test]
    fn system_prompt_and_history() {
        let messages = [
            msg(MessageRole::User, "Hi"),
            msg(MessageRole::Assistant, "Hello"),
        ];
        let prompt = format_prompt(&messages, Some("Be terse"));
        assert_eq!(
            prompt,
            "System: Be terse\n\nHuman: Hi\nAssistant: Hello\nAssistant: "
        );
    }

    #[test]
    fn empty_conversation() {
        assert_eq!(format_prompt(&[], None), "Assistant: ");
        assert_eq!(
            format_prompt(&[], Some("Be terse")),
            "System: Be terse\n\nAssistant: "
        );
    }

    #[test]
    fn non_assistant_roles_are_human_turns() {
        let messages = [
            msg(MessageRole::System, "rules"),
            msg(MessageRole::Other, "tool output"),
        ];
        assert_eq!(
            format_prompt(&messages, None),
            "Human: rules\nHuman: tool output\nAssistant: "
        );
    }

    #[test]
    fn empty_system_prompt_is_ignored() {
        let prompt = format_prompt(&[msg(MessageRole::User, "Hi")], Some(""));
        assert_eq!(prompt, "Human: Hi\nAssistant: ");
    }

    #[test]
    fn repeated_calls_agree() {
        let messages = [msg(MessageRole::User, "Hi")];
        assert_eq!(
            format_prompt(&messages, Some("x")),
            format_prompt(&messages, Some("x"))
        );
    }
}
