use dotenvy;

#[derive(Debug)]
pub struct AppConfig {
    pub db_namespace: String,
    pub db_database: String,
    pub db_password: Option<String>,
    pub db_username: Option<String>,
    pub db_url: String,
    pub paystack_secret_key: String,
    pub paystack_api_url: String,
    pub is_development: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let db_namespace = std::env::var("DB_NAMESPACE").unwrap_or("namespace".to_string());
        let db_database = std::env::var("DB_DATABASE").unwrap_or("database".to_string());
        let db_password = std::env::var("DB_PASSWORD").ok();
        let db_username = std::env::var("DB_USERNAME").ok();
        let db_url = std::env::var("DB_URL").expect("Missing DB_URL in env");

        let paystack_secret_key =
            std::env::var("PAYSTACK_SECRET_KEY").expect("Missing PAYSTACK_SECRET_KEY in env");
        let paystack_api_url = std::env::var("PAYSTACK_API_URL")
            .unwrap_or("https://api.paystack.co".to_string());

        let is_development = std::env::var("DEVELOPMENT")
            .expect("set DEVELOPMENT env var")
            .eq("true");

        Self {
            db_namespace,
            db_database,
            db_password,
            db_username,
            db_url,
            paystack_secret_key,
            paystack_api_url,
            is_development,
        }
    }
}
