//! ls / cat / find-tools over the tool catalog

use anyhow::Result;
use toolscript_services::Catalog;

pub fn cmd_ls(path: &str) -> Result<()> {
    for entry in Catalog::new().list(path)? {
        println!("{}", entry);
    }
    Ok(())
}

pub fn cmd_cat(path: &str) -> Result<()> {
    print!("{}", Catalog::new().read(path)?);
    Ok(())
}

pub fn cmd_find_tools(service: Option<&str>) -> Result<()> {
    let tools = Catalog::new().find_tools(service);
    if tools.is_empty() {
        eprintln!("No tools found.");
    }
    for t in tools {
        println!("{}", t);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_paths_are_errors() {
        assert!(cmd_ls("servers/nope").is_err());
        assert!(cmd_cat("servers/slack/nope.py").is_err());
        cmd_ls("").unwrap();
        cmd_find_tools(Some("slack")).unwrap();
    }
}
