use crate::cli::args::CliArgs;

pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| "expected 'Key: Value'".to_string())?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err("header name must be a single token".to_string());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn validate_path(raw: &str) -> Result<(), String> {
    if raw.trim().is_empty() {
        return Err("path must not be empty".to_string());
    }
    if !raw.starts_with('/') && !raw.starts_with("http://") && !raw.starts_with("https://") {
        return Err("expected an absolute path or URL".to_string());
    }
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.base_url.as_deref() {
        reqwest::Url::parse(raw).map_err(|e| format!("invalid --base-url '{raw}': {e}"))?;
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.header.as_deref() {
        parse_header(raw).map_err(|e| format!("invalid --header '{raw}': {e}"))?;
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --format '{raw}', expected html, text or json"
            ));
        }
    }
    for (flag, value) in [
        ("--identity-path", args.identity_path.as_deref()),
        ("--login-path", args.login_path.as_deref()),
        ("--logout-path", args.logout_path.as_deref()),
    ] {
        if let Some(raw) = value {
            validate_path(raw).map_err(|e| format!("invalid {flag} '{raw}': {e}"))?;
        }
    }
    Ok(())
}
