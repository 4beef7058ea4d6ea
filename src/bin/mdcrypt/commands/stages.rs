//! `mdcrypt stages` command

use anyhow::Result;

use mdcrypt::Stage;

pub fn execute() -> Result<()> {
    for stage in Stage::ALL {
        let scope = if stage.is_per_module() {
            "per module"
        } else {
            "once"
        };
        println!("{:>2}. {:<18} {}", stage.index() + 1, stage.as_str(), scope);
    }
    Ok(())
}
