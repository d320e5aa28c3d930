use sha2::{Digest, Sha256};

/// Read-mostly cache of ICPMP employee counts, keyed by the pattern/demand
/// shape. A hit lets the submit path report the expected pool size without
/// re-running the preprocessor.
#[cfg_attr(feature = "test-support", mockall::automock)]
pub trait EmployeeCountCache: Send + Sync {
    fn get(&self, key: &str) -> Option<u32>;
    fn put(&self, key: &str, employees_required: u32);
}

/// Stable cache key over the work pattern and the demand it serves.
pub fn pattern_cache_key(pattern: &[String], demand_id: &str, headcount: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(demand_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(headcount.to_le_bytes());
    for entry in pattern {
        hasher.update([0u8]);
        hasher.update(entry.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_and_shape_sensitive() {
        let pattern: Vec<String> = ["D", "D", "O"].iter().map(|s| s.to_string()).collect();
        let a = pattern_cache_key(&pattern, "D1", 5);
        let b = pattern_cache_key(&pattern, "D1", 5);
        assert_eq!(a, b);

        assert_ne!(a, pattern_cache_key(&pattern, "D2", 5));
        assert_ne!(a, pattern_cache_key(&pattern, "D1", 6));
        let other: Vec<String> = ["D", "O", "D"].iter().map(|s| s.to_string()).collect();
        assert_ne!(a, pattern_cache_key(&other, "D1", 5));
    }
}
