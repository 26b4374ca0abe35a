use clap::{Parser, Subcommand};

/// toolscript - run agent-written programs in a restricted sandbox
#[derive(Parser, Debug)]
#[command(name = "toolscript")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate, compile and run a program; prints the result envelope as JSON
    Exec {
        /// Program file. Use "-" (or omit together with --code) to read stdin
        #[arg(value_name = "FILE")]
        file: Option<String>,

        /// Program source given inline
        #[arg(long, short = 'c', conflicts_with = "file")]
        code: Option<String>,

        /// Wall-clock budget in seconds (default: from env or 30)
        #[arg(long)]
        timeout: Option<u64>,

        /// Interpreter step budget (default: from env or 5000000)
        #[arg(long)]
        max_steps: Option<u64>,
    },

    /// Run only the static validator
    Validate {
        #[arg(value_name = "FILE")]
        file: Option<String>,

        #[arg(long, short = 'c', conflicts_with = "file")]
        code: Option<String>,

        /// Output the detailed report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Manage and invoke saved program templates
    Skill {
        #[command(subcommand)]
        action: SkillAction,

        /// Skill store file (default: TOOLSCRIPT_SKILLS_FILE or ~/.toolscript/skills.json)
        #[arg(long, global = true, value_name = "PATH")]
        skills_file: Option<String>,
    },

    /// List a directory of the tool catalog
    Ls {
        #[arg(value_name = "PATH", default_value = "")]
        path: String,
    },

    /// Print a tool catalog file
    Cat {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// List tool files, optionally for one service
    FindTools {
        #[arg(value_name = "SERVICE")]
        service: Option<String>,
    },

    /// Generate a program for a task description and run it
    Task {
        #[arg(value_name = "DESCRIPTION")]
        description: String,

        /// Print the generated program to stderr before running it
        #[arg(long, default_value = "false")]
        show_code: bool,

        #[arg(long)]
        timeout: Option<u64>,

        #[arg(long)]
        max_steps: Option<u64>,
    },

    /// Start the JSON-RPC server
    Serve {
        /// Serve JSON-RPC 2.0 over stdin/stdout, one request per line
        #[arg(long, default_value = "false")]
        stdio: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SkillAction {
    /// Save (or overwrite) a template; `{{name}}` marks an argument
    Save {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(value_name = "FILE")]
        file: Option<String>,

        #[arg(long, short = 'c', conflicts_with = "file")]
        code: Option<String>,
    },

    /// Substitute arguments into a template and run it
    Invoke {
        #[arg(value_name = "NAME")]
        name: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        #[arg(long)]
        timeout: Option<u64>,

        #[arg(long)]
        max_steps: Option<u64>,
    },

    /// List saved skills
    List {
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print a skill's template
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Delete a skill
    Remove {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exec_inline_code() {
        let cli = Cli::parse_from(["toolscript", "exec", "--code", "result = 1", "--timeout", "5"]);
        match cli.command {
            Commands::Exec { file, code, timeout, max_steps } => {
                assert_eq!(file, None);
                assert_eq!(code.as_deref(), Some("result = 1"));
                assert_eq!(timeout, Some(5));
                assert_eq!(max_steps, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exec_file_and_code_conflict() {
        assert!(Cli::try_parse_from(["toolscript", "exec", "prog.py", "--code", "x = 1"]).is_err());
    }

    #[test]
    fn test_skill_invoke_args() {
        let cli = Cli::parse_from([
            "toolscript",
            "skill",
            "invoke",
            "report",
            "--args",
            r#"{"id": "abc123"}"#,
            "--skills-file",
            "/tmp/s.json",
        ]);
        match cli.command {
            Commands::Skill { action: SkillAction::Invoke { name, args, .. }, skills_file } => {
                assert_eq!(name, "report");
                assert_eq!(args, r#"{"id": "abc123"}"#);
                assert_eq!(skills_file.as_deref(), Some("/tmp/s.json"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_find_tools_service_optional() {
        let cli = Cli::parse_from(["toolscript", "find-tools"]);
        assert!(matches!(cli.command, Commands::FindTools { service: None }));
    }
}
