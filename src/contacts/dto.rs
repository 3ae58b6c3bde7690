use serde::Deserialize;

/// Contact form body; only the phone number is optional.
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub message: String,
}
