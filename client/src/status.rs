//! User-facing status lines.

use std::fmt::Display;

pub const SUBMITTING: &str = "Submitting salary...";
pub const SUBMIT_CANCELLED: &str = "Submission cancelled";
pub const SENDING_TRANSACTION: &str = "Sending transaction...";

pub const COMPARING: &str = "Comparing salaries...";
pub const SENDING_COMPARISON: &str = "Sending comparison request...";
pub const COMPARE_CANCELLED: &str = "Comparison cancelled";
pub const NOT_SUBMITTED: &str =
    "You have not submitted a salary yet. Please submit your encrypted salary first.";
pub const INVALID_ADDRESS: &str = "Invalid address format";
pub const REFRESH_FAILED: &str =
    "Unable to retrieve your salary. Please try again after submitting.";

pub const DECRYPTING_VALUE: &str = "Decrypting salary...";
pub const DECRYPTING_COMPARISON: &str = "Decrypting comparison result...";
pub const AUTHORIZATION_UNAVAILABLE: &str = "Unable to build decryption authorization";
pub const DECRYPT_CANCELLED: &str = "Decryption cancelled";
pub const DECRYPT_SUPERSEDED: &str = "Value changed while decrypting, please decrypt again";
pub const ALREADY_DECRYPTED: &str = "Already decrypted";
pub const EARNS_MORE: &str = "You earn MORE than the other person!";
pub const EARNS_LESS: &str = "You earn LESS than the other person!";

pub fn waiting_for(hash: impl Display) -> String {
    format!("Waiting for transaction: {hash}...")
}

pub fn submitted(status: u8) -> String {
    format!("Salary submitted successfully! Status: {status}")
}

pub fn submit_failed(error: impl Display) -> String {
    format!("Submission failed: {error}")
}

pub fn check_failed(error: impl Display) -> String {
    format!("Failed to check salary status: {error}")
}

pub fn compared(status: u8) -> String {
    format!("Comparison completed! Status: {status}")
}

pub fn batch_compared(count: usize, status: u8) -> String {
    format!("Batch comparison completed for {count} user(s)! Status: {status}")
}

pub fn compare_failed(error: impl Display) -> String {
    format!("Comparison failed: {error}")
}

pub fn own_value(value: u64) -> String {
    format!("Your salary: ${value}")
}

pub fn decrypt_failed(error: impl Display) -> String {
    format!("Decryption failed: {error}")
}

pub fn deployment_not_found(chain_id: u64) -> String {
    format!("Salary ledger deployment not found for chainId={chain_id}.")
}
