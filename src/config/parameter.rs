use dotenv::dotenv;

/// Loads `.env` into the process environment. A missing file is not an error.
pub fn init() {
    if let Err(e) = dotenv() {
        if !e.not_found() {
            eprintln!("failed to load .env file: {e}");
        }
    }
}
