// Secrets boundary: provider credentials are read from the environment at
// invocation time and never stored on outbox rows or webhook events.

pub fn get(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn webhook_secret(provider: &str) -> Option<String> {
    get(&format!("{}_WEBHOOK_SECRET", env_prefix(provider)))
}

fn env_prefix(provider: &str) -> String {
    provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
