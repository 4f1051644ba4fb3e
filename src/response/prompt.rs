use crate::directory::LookupResult;
use crate::llm::ChatMessage;

/// Email of a confirmed client, if the lookup produced one
fn known_email(lookup: &LookupResult) -> Option<&str> {
    match lookup {
        LookupResult {
            exists: true,
            email: Some(email),
        } => Some(email.as_str()),
        _ => None,
    }
}

/// System message describing the lookup outcome to the model
pub fn system_instruction(lookup: &LookupResult) -> String {
    let status = match known_email(lookup) {
        Some(email) => format!(
            "The person mentioned is a registered client whose email address is {}. \
             Reference that address naturally where it helps the reply.",
            email
        ),
        None => "The person mentioned is not found in our client database.".to_string(),
    };

    format!(
        "You are a helpful meeting scheduling assistant. {} \
         Please provide a professional and courteous response regarding their meeting request.",
        status
    )
}

/// Reply used when no model produced a completion
pub fn fallback_response(lookup: &LookupResult) -> String {
    match known_email(lookup) {
        Some(email) => format!(
            "I can see this is a registered client with the email address {}. \
             I'm sorry, but I'm having technical difficulties right now. \
             Please try again later or contact our support team directly for immediate assistance.",
            email
        ),
        None => "This person doesn't appear in our client database. \
                 I'm having technical difficulties right now, but you can register as a new client \
                 through our website or contact our support team for assistance."
            .to_string(),
    }
}

pub fn build_messages(prompt: &str, lookup: &LookupResult) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_instruction(lookup)),
        ChatMessage::user(prompt),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_instruction_embeds_email() {
        let instruction = system_instruction(&LookupResult::found("john@x.com"));
        assert!(instruction.contains("john@x.com"));
        assert!(instruction.contains("registered client"));
    }

    #[test]
    fn test_instruction_for_unknown_person() {
        let instruction = system_instruction(&LookupResult::not_found());
        assert!(instruction.contains("not found in our client database"));
    }

    #[test]
    fn test_fallbacks_differ_by_outcome() {
        let found = fallback_response(&LookupResult::found("john@x.com"));
        let missing = fallback_response(&LookupResult::not_found());

        assert!(found.contains("john@x.com"));
        assert!(missing.contains("register"));
        assert_eq!(found, fallback_response(&LookupResult::found("john@x.com")));
    }

    #[test]
    fn test_exists_without_email_counts_as_unknown() {
        let odd = LookupResult {
            exists: true,
            email: None,
        };
        assert_eq!(
            fallback_response(&odd),
            fallback_response(&LookupResult::not_found())
        );
    }

    #[test]
    fn test_build_messages_order() {
        let messages = build_messages("Meet John", &LookupResult::not_found());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].content, "Meet John");
    }
}
