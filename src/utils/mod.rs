pub mod redis_timeout;
