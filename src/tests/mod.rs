mod common;
mod expiration_refresh;
