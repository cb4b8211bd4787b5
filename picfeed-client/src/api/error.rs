use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Turn a transport error into the short notice shown to the user
pub fn categorize_error(error_str: &str) -> String {
    let error_lower = error_str.to_lowercase();

    // Network errors
    if error_lower.contains("connection")
        || error_lower.contains("timeout")
        || error_lower.contains("network")
    {
        return "Network Error: Connection failed. Check your network and try again".to_string();
    }

    // Authorization errors
    if error_lower.contains("401")
        || error_lower.contains("403")
        || error_lower.contains("unauthorized")
        || error_lower.contains("forbidden")
    {
        return "Authorization Error: The server refused this action".to_string();
    }

    // Validation errors
    if error_lower.contains("400")
        || error_lower.contains("bad request")
        || error_lower.contains("invalid")
    {
        return format!("Validation Error: {}", error_str);
    }

    // Server errors
    if error_lower.contains("500") || error_lower.contains("502") || error_lower.contains("503") {
        return "Server Error: The server is experiencing issues. Please try again later"
            .to_string();
    }

    format!("Error: {}", error_str)
}
