use std::env;

pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub frontend_origin: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let supabase_url = env::var("SUPABASE_URL").expect("SUPABASE_URL must be set");

        let supabase_anon_key =
            env::var("SUPABASE_ANON_KEY").expect("SUPABASE_ANON_KEY must be set");

        let supabase_service_role_key =
            env::var("SUPABASE_SERVICE_ROLE_KEY").expect("SUPABASE_SERVICE_ROLE_KEY must be set");

        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");

        Config {
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            frontend_origin,
        }
    }
}
