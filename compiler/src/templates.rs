//! Fixed boilerplate spliced into the generated crates. Placeholders are
//! written `{{name}}`.

pub const NATIVE_MANIFEST: &str = include_str!("../static/native.Cargo.toml");
pub const NATIVE_PRELUDE: &str = include_str!("../static/native_prelude.rs");
pub const BRIDGE_MANIFEST: &str = include_str!("../static/bridge.Cargo.toml");
pub const BRIDGE_PRELUDE: &str = include_str!("../static/bridge_prelude.rs");

/// Replace every `{{key}}` in `template`. Unknown placeholders are left as is.
pub fn render(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = template.to_owned();
    for (key, value) in params {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}
