//! Shared status icons, with plain-text fallbacks for terminals without
//! emoji support.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
