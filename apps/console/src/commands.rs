//! Operator intents typed at the console prompt.

use shared::domain::{Category, EntityId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Options,
    Show,
    Select(Vec<EntityId>),
    Move { source: EntityId, target: EntityId },
    Save,
    Reload,
    SwitchCategory(Category),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  options               list selectable entities
  show                  print the current order
  select <id> [id...]   replace the selection, in the given order
  move <source> <target>
                        move <source> into the slot held by <target>
  save                  persist the current order
  reload                discard local changes and reload
  category <name>       switch to another category
  help                  this text
  quit                  leave";

pub fn parse_intent(line: &str) -> Result<Intent, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    match verb.to_ascii_lowercase().as_str() {
        "options" | "entities" => no_args(&args, Intent::Options),
        "show" | "ls" => no_args(&args, Intent::Show),
        "select" => Ok(Intent::Select(parse_ids(&args)?)),
        "move" | "mv" => match parse_ids(&args)?.as_slice() {
            [source, target] => Ok(Intent::Move {
                source: *source,
                target: *target,
            }),
            _ => Err("usage: move <source> <target>".to_string()),
        },
        "save" => no_args(&args, Intent::Save),
        "reload" => no_args(&args, Intent::Reload),
        "category" => match args.as_slice() {
            [name] => Category::new(name)
                .map(Intent::SwitchCategory)
                .map_err(|e| e.to_string()),
            _ => Err("usage: category <name>".to_string()),
        },
        "help" | "?" => Ok(Intent::Help),
        "quit" | "exit" | "q" => Ok(Intent::Quit),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

fn no_args(args: &[&str], intent: Intent) -> Result<Intent, String> {
    if args.is_empty() {
        Ok(intent)
    } else {
        Err(format!("unexpected arguments: {}", args.join(" ")))
    }
}

fn parse_ids(args: &[&str]) -> Result<Vec<EntityId>, String> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            raw.parse::<i64>()
                .map(EntityId)
                .map_err(|_| format!("'{raw}' is not an entity id"))
        })
        .collect()
}
