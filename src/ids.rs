use rand::{distributions::Alphanumeric, Rng};

/// Public identifier such as `APT-7K2QX9PL`: a prefix and eight upper-case
/// alphanumerics.
pub fn new_uid(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{prefix}-{suffix}")
}
