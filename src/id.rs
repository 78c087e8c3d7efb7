//! ID generation utilities for stagehand
//!
//! Agent ids are time+random derived and never reused.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Generate a unique agent ID
///
/// Format: `agent-{timestamp_ms}-{random_hex}`
/// Example: `agent-1738300800123-a1b2`
pub fn generate_agent_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("agent-{}-{:04x}", timestamp, random)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        // Should be after 2020-01-01 and before 2100-01-01
        assert!(ts > 1577836800000);
        assert!(ts < 4102444800000);
    }

    #[test]
    fn test_generate_agent_id_format() {
        let id = generate_agent_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "agent");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_agent_id_uniqueness() {
        let id1 = generate_agent_id();
        let id2 = generate_agent_id();
        // With random component, should be different
        assert_ne!(id1, id2);
    }
}
