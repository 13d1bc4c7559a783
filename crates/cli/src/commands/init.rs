//! `tandem init`: Write the story-refinement example workflow.

use std::path::Path;
use tandem::STORY_WORKFLOW;

pub fn run(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        println!("⚠️  {} already exists. Use --force to overwrite it.", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, STORY_WORKFLOW)?;

    println!("✅ Wrote example workflow to {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set TANDEM_API_KEY (or add api_key to ~/.tandem/config.toml)");
    println!("   2. Run: tandem validate {}", path.display());
    println!("   3. Run: tandem run {} --input \"a lighthouse keeper\"\n", path.display());

    Ok(())
}
