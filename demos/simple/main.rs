use gatekit::{ClientConfig, User};

pub fn main() {
    env_logger::init();

    let sdk_key = std::env::var("GATEKIT_SDK_KEY").unwrap();
    let client = ClientConfig::from_sdk_key(sdk_key).to_client().unwrap();

    // Fetch the evaluation snapshot for the user. Until a snapshot is
    // installed, all evaluations resolve to defaults.
    if let Err(err) = client.initialize(User::with_user_id("test-user")) {
        eprintln!("initialize failed: {err}; serving defaults");
    }

    // Keep the snapshot fresh in the background.
    let poller = client.start_poller().unwrap();

    let checkout_enabled = client.check_gate("new_checkout").unwrap_or(false);
    println!("new_checkout: {checkout_enabled}");

    let banner = client.get_config("homepage_banner").unwrap();
    println!(
        "banner text: {}",
        banner.get_string("text", "Welcome!")
    );

    client
        .log_event("demo_viewed", Some(1.0.into()), None)
        .unwrap();

    poller.stop();
    client.shutdown();
}
