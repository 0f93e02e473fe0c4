// ── Exclusive selection ──

use patchbay_api::model::Terminal;

/// Compute the desired terminal set for "activate exactly one terminal
/// in this port".
///
/// Returns a new list with the same length, member set, order, and
/// indexes as the input, where the selected terminal is on and every
/// other terminal is off, regardless of prior state. The full list is
/// always produced so a single exclusive click maps deterministically to
/// one whole-port command.
pub fn exclusive_select(terminals: &[Terminal], selected: &str) -> Vec<Terminal> {
    terminals
        .iter()
        .map(|t| {
            let mut terminal = t.clone();
            terminal.state = terminal.name == selected;
            terminal
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn port(states: &[(&str, bool)]) -> Vec<Terminal> {
        states.iter().map(|(n, s)| Terminal::new(*n, *s)).collect()
    }

    #[test]
    fn selects_exactly_one_and_clears_the_rest() {
        let result = exclusive_select(&port(&[("A", false), ("B", true), ("C", false)]), "A");
        assert_eq!(result, port(&[("A", true), ("B", false), ("C", false)]));
    }

    #[test]
    fn prior_states_are_irrelevant() {
        let result = exclusive_select(&port(&[("A", true), ("B", true), ("C", true)]), "B");
        assert_eq!(result, port(&[("A", false), ("B", true), ("C", false)]));
    }

    #[test]
    fn order_and_membership_are_preserved() {
        let input = port(&[("40m", false), ("160m", false), ("80m", true)]);
        let result = exclusive_select(&input, "160m");

        let names: Vec<&str> = result.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["40m", "160m", "80m"]);
    }

    #[test]
    fn unknown_selection_clears_everything() {
        let result = exclusive_select(&port(&[("A", true), ("B", true)]), "Z");
        assert_eq!(result, port(&[("A", false), ("B", false)]));
    }

    #[test]
    fn empty_port_yields_empty_command() {
        assert!(exclusive_select(&[], "A").is_empty());
    }

    #[test]
    fn terminal_indexes_survive_selection() {
        let mut input = port(&[("A", false), ("B", false)]);
        input[0].index = 2;
        input[1].index = 1;

        let result = exclusive_select(&input, "B");
        assert_eq!(result[0].index, 2);
        assert_eq!(result[1].index, 1);
        assert!(result[1].state);
    }
}
