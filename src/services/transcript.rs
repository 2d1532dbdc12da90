use crate::models::conversation::ConversationMessage;
use crate::models::interview::Interview;
use crate::utils::time::format_line_timestamp;

fn sender_tag(interview: &Interview, from_email: &str) -> String {
    if from_email.eq_ignore_ascii_case(&interview.candidate_email) {
        format!("Candidate <{}>", interview.candidate_email)
    } else if from_email.eq_ignore_ascii_case(&interview.interviewer_email) {
        format!("Interviewer <{}>", interview.interviewer_email)
    } else if from_email.eq_ignore_ascii_case(&interview.recruiter_email) {
        format!("Recruiter <{}>", interview.recruiter_email)
    } else {
        from_email.to_string()
    }
}

/// Renders the conversation as one line per message, oldest first. The
/// bracketed timestamps let the model resolve "tomorrow" and friends.
pub fn build_transcript(interview: &Interview, messages: &[ConversationMessage]) -> String {
    let mut ordered: Vec<&ConversationMessage> = messages.iter().collect();
    ordered.sort_by_key(|m| m.created_at);

    ordered
        .iter()
        .map(|m| {
            format!(
                "[{}] {}: {}",
                format_line_timestamp(m.created_at),
                sender_tag(interview, &m.from_email),
                m.body
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
