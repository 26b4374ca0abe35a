//! Skill commands: Save, Invoke, List, Show, Remove

use crate::cli::{Commands, SkillAction};
use crate::command_registry::CommandRegistry;
use crate::commands::skill;

pub fn register(reg: &mut CommandRegistry) {
    reg.register(|cmd| {
        let Commands::Skill { action, skills_file } = cmd else {
            return None;
        };
        let file = skills_file.as_deref();
        Some(match action {
            SkillAction::Save { name, file: src, code } => {
                skill::cmd_save(name, src.as_deref(), code.as_deref(), file)
            }
            SkillAction::Invoke {
                name,
                args,
                timeout,
                max_steps,
            } => skill::cmd_invoke(name, args, *timeout, *max_steps, file),
            SkillAction::List { json } => skill::cmd_list(*json, file),
            SkillAction::Show { name } => skill::cmd_show(name, file),
            SkillAction::Remove { name } => skill::cmd_remove(name, file),
        })
    });
}
