use clap::Parser;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "portfolio-gateway")]
#[command(about = "Contact and chat backend for the portfolio site")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Max notification emails per client per window
    #[arg(long, env = "RATE_LIMIT", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub rate_window: u64,

    // Mail API endpoint
    #[arg(long, env = "MAIL_API_URL", default_value = "https://api.resend.com/emails")]
    pub mail_api_url: String,

    // Mail API key; without one emails are only logged
    #[arg(long, env = "MAIL_API_KEY", hide_env_values = true)]
    pub mail_api_key: Option<String>,

    #[arg(long, env = "MAIL_FROM", default_value = "Portfolio <onboarding@resend.dev>")]
    pub mail_from: String,

    // Inbox that receives contact notifications
    #[arg(long, env = "MAIL_TO", default_value = "owner@example.com")]
    pub mail_to: String,

    // Ollama-compatible chat server
    #[arg(long, env = "LLM_URL", default_value = "http://localhost:11434")]
    pub llm_url: String,

    #[arg(long, env = "LLM_MODEL", default_value = "llama3.2")]
    pub llm_model: String,

    // Seconds a chat turn may wait for the first token
    #[arg(long, env = "LLM_FIRST_TOKEN_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub llm_first_token_timeout: u64,

    // Seconds allowed to connect to the LLM or mail API
    #[arg(long, env = "CONNECT_TIMEOUT", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout: u64,

    // Pending sends the dispatch queue holds
    #[arg(long, env = "DISPATCH_QUEUE", default_value_t = 32,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub dispatch_queue: u64,

    // Allowed CORS origins (comma-separated), empty allows any
    #[arg(long, env = "CORS_ORIGINS", default_value = "")]
    pub cors_origins: String,
}

impl Args {
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && *s != "*")
            .map(str::to_string)
            .collect()
    }

    // Blank keys count as unset
    pub fn mail_key(&self) -> Option<&str> {
        self.mail_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}
