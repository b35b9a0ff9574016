//! Function declarations passed to `Runtime.callFunctionOn`.
//!
//! Each runs with `this` bound to an element, a document, or (for
//! lookups) the current search root.

/// `this` = search root (document or element). Returns an element array.
pub(super) const FIND: &str = r#"function(kind, query) {
    const scope = this;
    const doc = scope.ownerDocument || scope;
    if (kind === 'css') {
        return Array.from(scope.querySelectorAll(query));
    }
    if (kind === 'id') {
        const el = doc.getElementById(query);
        return el && (scope === doc || scope.contains(el)) ? [el] : [];
    }
    if (kind === 'name') {
        return Array.from(scope.querySelectorAll('[name="' + CSS.escape(query) + '"]'));
    }
    if (kind === 'xpath') {
        const snap = doc.evaluate(query, scope, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        const out = [];
        for (let i = 0; i < snap.snapshotLength; i++) {
            const node = snap.snapshotItem(i);
            if (node && node.nodeType === 1) out.push(node);
        }
        return out;
    }
    return [];
}"#;

pub(super) const STATE: &str = r#"function() {
    const el = this;
    const tag = (el.tagName || '').toLowerCase();
    const view = (el.ownerDocument && el.ownerDocument.defaultView) || window;
    let displayed = false;
    if (el.isConnected) {
        const style = view.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        displayed = style.display !== 'none'
            && style.visibility !== 'hidden'
            && parseFloat(style.opacity || '1') > 0
            && (rect.width > 0 || rect.height > 0);
    }
    const type = (el.type || el.getAttribute('type') || '').toLowerCase();
    const checkable = tag === 'input' && (type === 'checkbox' || type === 'radio');
    return {
        connected: el.isConnected,
        displayed: displayed,
        enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true',
        readOnly: !!el.readOnly,
        tag: tag,
        inputType: type || null,
        value: ('value' in el && tag !== 'button') ? String(el.value) : null,
        text: ((el.innerText || el.textContent || '') + '').trim(),
        checked: checkable ? !!el.checked : null,
        selected: tag === 'option' ? !!el.selected : null
    };
}"#;

pub(super) const ATTRIBUTE: &str = "function(name) { return this.getAttribute(name); }";

pub(super) const CLEAR: &str = r#"function() {
    if ('value' in this) {
        this.value = '';
    } else if (this.isContentEditable) {
        this.textContent = '';
    }
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

pub(super) const SET_VALUE: &str = r#"function(value) {
    const el = this;
    const view = (el.ownerDocument && el.ownerDocument.defaultView) || window;
    const proto = el.tagName === 'TEXTAREA' ? view.HTMLTextAreaElement.prototype
        : el.tagName === 'SELECT' ? view.HTMLSelectElement.prototype
        : view.HTMLInputElement.prototype;
    const desc = Object.getOwnPropertyDescriptor(proto, 'value');
    if (desc && desc.set) { desc.set.call(el, value); } else { el.value = value; }
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    el.dispatchEvent(new Event('blur', { bubbles: true }));
    return String(el.value);
}"#;

pub(super) const SET_CHECKED: &str = r#"function(checked) {
    if ('checked' in this) {
        this.checked = checked;
    } else {
        this.setAttribute('aria-checked', checked ? 'true' : 'false');
    }
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

pub(super) const JS_CLICK: &str = "function() { this.click(); }";

pub(super) const DISPATCH: &str =
    "function(name) { this.dispatchEvent(new Event(name, { bubbles: true })); }";

pub(super) const FOCUS: &str = "function() { this.focus(); }";

pub(super) const BLUR: &str = "function() { this.blur(); }";

pub(super) const SCROLL_INTO_VIEW: &str =
    "function() { this.scrollIntoView({ block: 'center', inline: 'center' }); }";

pub(super) const OPTIONS: &str = r#"function() {
    return Array.from(this.options || []).map(function(o, i) {
        return { value: o.value, text: (o.text || '').trim(), index: i, selected: o.selected };
    });
}"#;

pub(super) const SELECT_OPTION: &str = r#"function(index, selected) {
    const option = this.options && this.options[index];
    if (!option) return false;
    option.selected = selected;
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
}"#;

/// `this` = iframe element. Null for cross-origin frames.
pub(super) const CONTENT_DOCUMENT: &str =
    "function() { return this.contentDocument; }";

/// Wrap a Selenium-style script body so it can run via callFunctionOn.
pub(super) fn wrap_body(body: &str) -> String {
    format!("function() {{\n{}\n}}", body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_body() {
        let wrapped = wrap_body("return arguments[0] + 1;");
        assert!(wrapped.starts_with("function() {"));
        assert!(wrapped.contains("arguments[0]"));
        assert!(wrapped.ends_with('}'));
    }

    #[test]
    fn test_find_handles_all_lookup_kinds() {
        for kind in ["'css'", "'id'", "'name'", "'xpath'"] {
            assert!(FIND.contains(kind));
        }
    }
}
