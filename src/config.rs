//! Environment overrides for [`CompileOptions`](crate::compiler::CompileOptions) and
//! [`BuildOptions`](crate::backends::native::BuildOptions).

/// `1`, `true`, `yes` and `on` are true; `0`, `false`, `no` and `off` are false.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|x| !x.trim().is_empty())
}

pub fn env_bool(key: &str) -> Option<bool> {
    let value = env_string(key)?;
    let parsed = parse_bool(&value);
    if parsed.is_none() {
        log::warn!("Ignoring {key}={value:?}: not a boolean");
    }
    parsed
}

/// Whitespace separated list.
pub fn env_list(key: &str) -> Option<Vec<String>> {
    env_string(key).map(|x| x.split_whitespace().map(str::to_string).collect())
}
