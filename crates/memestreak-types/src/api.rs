use serde::{Deserialize, Serialize};

use crate::de::lenient_string;

// -- JWT Claims --

/// Session token claims issued by `/verifyOTP` and checked by `/autoLogin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub uid: String,
    pub exp: usize,
}

// -- Website login --

#[derive(Debug, Default, Deserialize)]
pub struct VerifyUidRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub uid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyUidResponse {
    pub valid: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendCodeRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub uid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendCodeResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub uid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub otp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoLoginRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLoginResponse {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}
