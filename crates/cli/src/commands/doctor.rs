//! `tandem doctor`: Diagnose config and provider health.

use tandem_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Tandem Doctor");
    println!("================\n");

    let mut issues = 0;

    let config_path = AppConfig::path();
    let config = match AppConfig::load() {
        Ok(config) => {
            if config_path.exists() {
                println!("  ✅ Config file valid: {}", config_path.display());
            } else {
                println!("  ⚠️  No config file at {}, using defaults", config_path.display());
            }
            config
        }
        Err(e) => {
            println!("  ❌ Config file invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    println!(
        "  ✅ Model: {} via '{}'",
        config.model_name(),
        config.model.provider
    );

    if config.has_api_key() {
        println!("  ✅ API key configured for '{}'", config.model.provider);
    } else {
        println!(
            "  ⚠️  No API key for '{}'; set TANDEM_API_KEY or add api_key to config.toml",
            config.model.provider
        );
        issues += 1;
    }

    println!(
        "  ✅ Retry: {} attempts, base {}, initial delay {}s, codes {:?}",
        config.retry.attempts,
        config.retry.exp_base,
        config.retry.initial_delay_secs,
        config.retry.http_status_codes
    );

    println!(
        "  ✅ Built-in tools: {}",
        tandem_tools::builtin_registry().names().join(", ")
    );

    let router = tandem_providers::build_from_config(&config);
    for name in router.list() {
        let Some(provider) = router.get(name) else {
            continue;
        };
        match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{name}' reachable"),
            Ok(false) => {
                println!("  ⚠️  Provider '{name}' responded but reports unhealthy");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{name}' unreachable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
