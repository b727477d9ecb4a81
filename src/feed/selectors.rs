//! Target-site structure: URLs, selectors, and the in-page collection
//! script. Everything fragile about the page lives here.

pub const BASE_URL: &str = "https://www.facebook.com/";
pub const LOGIN_URL: &str = "https://www.facebook.com/login";
pub const DEFAULT_SITE: &str = "facebook.com";

pub const EMAIL_INPUT: &str = "input[name=\"email\"]";
pub const PASSWORD_INPUT: &str = "input[name=\"pass\"]";

/// Marker present only on authenticated pages; used to probe session validity.
pub const AUTH_MARKER: &str = "div[role=\"navigation\"]";

/// Cookie-consent accept buttons across regions and page versions.
pub const CONSENT_BUTTONS: &[&str] = &[
    "[data-testid=\"cookie-policy-manage-dialog-accept-button\"]",
    "button[data-cookiebanner=\"accept_button\"]",
    "[aria-label=\"Allow all cookies\"]",
    "[aria-label=\"Zezwól na wszystkie pliki cookie\"]",
    "[title=\"Allow all cookies\"]",
    "[title=\"Zezwól na wszystkie pliki cookie\"]",
];

pub const LOGIN_BUTTONS: &[&str] = &[
    "button[name=\"login\"]",
    "#loginbutton",
    "[data-testid=\"royal_login_button\"]",
];

/// Submits the login form directly when no known button selector matches.
pub const SUBMIT_LOGIN_FORM_JS: &str = r#"(() => {
    const form = document.querySelector('form[action*="login"], form#login_form, form');
    if (form) { form.submit(); return true; }
    return false;
})()"#;

/// URL fragments that indicate a secondary verification step.
pub const CHECKPOINT_MARKERS: &[&str] = &[
    "checkpoint",
    "challenge",
    "two_step",
    "login/device",
    "login/identify",
    "approval",
];

/// URL fragments that indicate login did not complete.
pub const LOGIN_STUCK_MARKERS: &[&str] = &["login", "recover", "checkpoint"];

/// Dialogs that cover the feed after navigation.
pub const POPUP_CLOSERS: &[&str] = &[
    "[aria-label=\"Close\"]",
    "[aria-label=\"Zamknij\"]",
];

pub const GROUP_TITLE_META: &str = "meta[property=\"og:title\"]";
pub const GROUP_TITLE_FALLBACK: &str = "h1";

/// Collects every currently-mounted post node in one pass. Returns a JSON
/// string so the value survives the protocol boundary unchanged. Fields are
/// best-effort: a missing piece yields the default, never an abort.
pub const COLLECT_POSTS_JS: &str = r#"(() => {
    const nodes = document.querySelectorAll('[data-ad-rendering-role="story_message"], [data-ad-comet-preview="message"], [data-ad-preview="message"]');
    const out = [];
    const parseCount = (raw) => {
        if (!raw) return 0;
        const m = String(raw).match(/(\d+[\d\s,.]*)\s*([KkMm])?/);
        if (!m) return 0;
        let val = parseFloat(m[1].replace(/,/g, '.').replace(/\s/g, ''));
        if (isNaN(val)) return 0;
        if (m[2]) val *= m[2].toLowerCase() === 'k' ? 1000 : 1000000;
        return Math.floor(val);
    };
    for (const el of nodes) {
        const root = el.closest('div[role="article"]') || el;
        const entry = { permalink: null, text: '', comments: [], reactions: 0, timestamp: '' };
        try {
            entry.text = (el.innerText || '').trim();

            const link = root.querySelector('a[href*="/posts/"], a[href*="/permalink/"], a[href*="multi_permalinks"]');
            if (link && link.href) entry.permalink = link.href.split('?')[0];
            if (link) entry.timestamp = (link.innerText || '').trim();

            // Aggregate reaction count: the button opening the reaction list
            // carries it in its aria-label; fall back to bare numeric lines
            // in the action-bar area.
            const toolbar = root.querySelector('[role="toolbar"]');
            if (toolbar) {
                const btn = toolbar.querySelector('[role="button"][aria-label*="people"], [role="button"][aria-label*="osób"], [role="button"][aria-label]');
                if (btn) entry.reactions = parseCount(btn.getAttribute('aria-label'));
            }
            if (!entry.reactions) {
                const lines = (root.innerText || '').split('\n').map(l => l.trim()).filter(Boolean);
                for (let i = lines.length - 1; i >= 0; i--) {
                    const line = lines[i];
                    if (/^\d+[\d\s,.]*[KkMm]?$/.test(line) && !/\d+[hmwdys]$/.test(line)) {
                        entry.reactions = parseCount(line);
                        break;
                    }
                }
            }

            const commentNodes = root.querySelectorAll('div[aria-label^="Comment by"], div[aria-label^="Komentarz"], div[role="article"] div[dir="auto"]');
            const seen = new Set();
            for (const c of commentNodes) {
                const text = (c.innerText || '').trim();
                if (text && text !== entry.text && !seen.has(text)) {
                    seen.add(text);
                    entry.comments.push(text);
                }
                if (entry.comments.length >= 20) break;
            }
        } catch (e) {
            // keep whatever was filled in before the failure
        }
        out.push(entry);
    }
    return JSON.stringify(out);
})()"#;
