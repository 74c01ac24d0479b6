pub const ERR_MUTEX_LOCK: &str = "Failed to get lock on Mutex";
