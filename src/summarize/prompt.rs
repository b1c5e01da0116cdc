//! Instruction prompt sent with every review.

pub const INSTRUCTIONS: &str = "You are summarizing and shortening this customer review in a way \
where only the important information is kept. Avoid using bullets, just separate things into \
sentences.\nFormat your answer like this:\n(Summary of customer review)";

/// Instructions followed by the review body.
pub fn build_prompt(review: &str) -> String {
    format!("{INSTRUCTIONS}\n\nCustomer Review: {}", review.trim())
}
