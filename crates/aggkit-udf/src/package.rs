use std::collections::BTreeSet;

/// Names of the global functions a Lua package defines at top level.
///
/// Only unindented `function name(` declarations count; `local function`s
/// and nested definitions cannot be called by the server.
pub fn exported_functions(source: &str) -> BTreeSet<String> {
    source
        .lines()
        .filter_map(|line| line.strip_prefix("function "))
        .filter_map(|rest| rest.split_once('('))
        .map(|(name, _)| name.trim())
        .filter(|name| is_identifier(name))
        .map(str::to_string)
        .collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_top_level_functions_only() {
        let source = "\
local function helper(x)
  return x
end

function select_agg_records(stream, args)
  function nested() end
  return stream
end

function M.method(self) end
function  spaced (a) end
";
        let names: Vec<_> = exported_functions(source).into_iter().collect();
        assert_eq!(names, vec!["select_agg_records", "spaced"]);
    }
}
