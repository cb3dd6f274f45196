//! Message template rendering.

use herald_common::Recipient;

/// The only placeholder a template recognizes.
pub const NAME_PLACEHOLDER: &str = "{{name}}";

/// Substitute the recipient's display name for the first `{{name}}` in `template`.
///
/// Later occurrences are left untouched, and a missing display name renders as
/// an empty string. Templates without the placeholder come back unchanged.
pub fn render(template: &str, recipient: &Recipient) -> String {
    template.replacen(NAME_PLACEHOLDER, recipient.display_name_or_empty(), 1)
}
