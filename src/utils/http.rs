use once_cell::sync::Lazy;
use reqwest::Client;

pub static SHARED_CLIENT: Lazy<Client> = Lazy::new(|| create_base_client(30));

fn create_base_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(crate::constants::USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

pub fn get_client() -> Client {
    SHARED_CLIENT.clone()
}
