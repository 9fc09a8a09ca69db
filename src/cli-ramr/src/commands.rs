/// Backslash commands understood by the prompt.
#[derive(Debug, PartialEq)]
pub enum Commands {
    /// `\i <csv file> <table>`: load CSV data into a table.
    Import { path: String, table: String },
    /// `\dt`: list the relations of the catalog.
    ShowTables,
    /// `\explain`: toggle printing task graphs as json.
    Explain,
    /// `\quit`
    Quit,
}

/// Parses a line starting with `\`.
///
/// Returns `None` for unknown commands or wrong arguments.
pub fn parse_command(line: &str) -> Option<Commands> {
    let mut parts = line.trim().split_whitespace();
    let command = parts.next()?;
    let args: Vec<&str> = parts.collect();
    match (command, args.as_slice()) {
        ("\\i", [path, table]) => Some(Commands::Import {
            path: path.to_string(),
            table: table.to_string(),
        }),
        ("\\dt", []) => Some(Commands::ShowTables),
        ("\\explain", []) => Some(Commands::Explain),
        ("\\quit", []) | ("\\q", []) => Some(Commands::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            Some(Commands::Import {
                path: String::from("data/person.csv"),
                table: String::from("Person")
            }),
            parse_command("\\i  data/person.csv Person ")
        );
        assert_eq!(Some(Commands::Quit), parse_command("\\q"));
        assert_eq!(Some(Commands::ShowTables), parse_command("\\dt"));
        assert_eq!(None, parse_command("\\i person.csv"));
        assert_eq!(None, parse_command("\\drop Person"));
    }
}
