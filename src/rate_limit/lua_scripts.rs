/// Lua script for the atomic check-and-record of a purchase attempt
///
/// Writes `now` only when no attempt inside the window is stored, so two
/// concurrent requests for the same client cannot both be admitted.
///
/// KEYS[1] = the attempt key
/// ARGV[1] = current timestamp (milliseconds)
/// ARGV[2] = window duration (milliseconds)
/// ARGV[3] = key expiry (seconds)
///
/// Returns: [acquired (0/1), timestamp of the record now in force]
pub const ACQUIRE_IF_IDLE_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local ttl = tonumber(ARGV[3])

local raw = redis.call('GET', key)
if raw then
    local last = tonumber(raw)
    if last == nil then
        return redis.error_reply('corrupt attempt record')
    end

    -- Mirrors within_window(): future records (clock skew) also block
    local elapsed = now - last
    if elapsed < 0 then
        elapsed = 0
    end
    if elapsed < window then
        return {0, last}
    end
end

redis.call('SET', key, ARGV[1], 'EX', ttl)
return {1, now}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_valid() {
        assert!(ACQUIRE_IF_IDLE_SCRIPT.contains("GET"));
        assert!(ACQUIRE_IF_IDLE_SCRIPT.contains("'SET', key, ARGV[1], 'EX', ttl"));
        assert!(ACQUIRE_IF_IDLE_SCRIPT.contains("elapsed < window"));
    }
}
