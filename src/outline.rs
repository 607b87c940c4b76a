use crate::navigator::minimize;
use crate::stapler::{ScopeNode, ScopeTree};
use crate::time_scope::TimeScope;
use std::fmt::Write;

const INDENT: &str = "  ";

/// Renders a stapled tree as an indented plain-text outline.
///
/// Scope labels are minimized against `reference`; records are rendered by
/// `render_record` one per line beneath their scope.
pub fn render_outline<R>(
    tree: &ScopeTree<R>,
    reference: &TimeScope,
    render_record: impl Fn(&R) -> String,
) -> String {
    let mut out = String::new();
    for (scope, node) in tree.roots() {
        render_node(&mut out, scope, node, reference, &render_record, 0);
    }
    out
}

fn render_node<R>(
    out: &mut String,
    scope: &TimeScope,
    node: &ScopeNode<R>,
    reference: &TimeScope,
    render_record: &impl Fn(&R) -> String,
    depth: usize,
) {
    let indent = INDENT.repeat(depth);
    let _ = writeln!(out, "{}{} ({})", indent, label(scope, reference), node.total_records());
    for record in node.records() {
        let _ = writeln!(out, "{}{}- {}", indent, INDENT, render_record(record));
    }
    for (child_scope, child) in node.children() {
        render_node(out, child_scope, child, reference, render_record, depth + 1);
    }
}

fn label(scope: &TimeScope, reference: &TimeScope) -> String {
    let short = minimize(scope, reference);
    if short.is_empty() {
        scope.to_string()
    } else {
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stapler::{ScopeSource, Stapler, StaplerConfig};

    struct Line {
        scope: &'static str,
        text: &'static str,
    }

    fn line(scope: &'static str, text: &'static str) -> Line {
        Line { scope, text }
    }

    #[test]
    fn outline_indents_by_depth_and_minimizes_labels() {
        let config = StaplerConfig {
            week_promotion_threshold: 1,
            quarter_promotion_threshold: 0,
            ..StaplerConfig::default()
        };
        let stapler = Stapler::new(
            config,
            |record: &Line| ScopeSource::scope(record.scope),
            |record: &Line| record.text,
        );
        let tree = stapler
            .add_everything(vec![
                line("2020-ww48.4", "write report"),
                line("2020-ww48.4", "call bank"),
                line("2020-ww49.1", "review"),
                line("2019-ww30.2", "old"),
            ])
            .expect("stapled");

        let reference = TimeScope::parse("2020-ww48.4").expect("scope");
        let outline = render_outline(&tree, &reference, |record| record.text.to_string());
        let expected = [
            "2019—Q3 (1)",
            "  2019-ww30 (1)",
            "    - old",
            "Q4 (3)",
            "  ww48 (2)",
            "    2020-ww48.4 (2)",
            "      - call bank",
            "      - write report",
            "  ww49 (1)",
            "    - review",
            "",
        ]
        .join("\n");
        assert_eq!(outline, expected);
    }
}
