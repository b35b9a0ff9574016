//! In-page structure query run by [`PageExtractor`](super::PageExtractor).
//!
//! Returns `{ url, title, forms, inputs, buttons }`. Button purpose is
//! classified on the Rust side from the returned text.

/// Marker the fake page keys scripted extraction responses on.
pub const EXTRACT_MARKER: &str = "jobfill:extract";

pub(crate) const EXTRACT_SCRIPT: &str = r#"/* jobfill:extract */
const MAX_FORMS = 10, MAX_INPUTS = 100, MAX_BUTTONS = 50, MAX_OPTIONS = 30;
const out = { url: location.href, title: document.title, forms: [], inputs: [], buttons: [] };
const clip = (s, n) => (s || '').trim().replace(/\s+/g, ' ').slice(0, n);
const attr = (el, name) => el.getAttribute(name) || '';
const visible = (el) => {
    if (!el) return false;
    const style = getComputedStyle(el);
    return style.display !== 'none' && style.visibility !== 'hidden' && style.opacity !== '0'
        && el.offsetWidth > 0 && el.offsetHeight > 0;
};
const labelOf = (el) => {
    if (el.id) {
        const byFor = document.querySelector(`label[for="${CSS.escape(el.id)}"]`);
        if (byFor) return clip(byFor.textContent, 200);
    }
    const wrapping = el.closest('label');
    if (wrapping) return clip(wrapping.textContent, 200);
    if (attr(el, 'aria-label')) return clip(attr(el, 'aria-label'), 200);
    const labelledBy = attr(el, 'aria-labelledby');
    if (labelledBy) {
        const target = document.getElementById(labelledBy.split(' ')[0]);
        if (target) return clip(target.textContent, 200);
    }
    const container = el.closest('[data-automation-id]') || el.parentElement;
    if (container) {
        const near = container.querySelector('label, [data-automation-id*="formLabel"], [data-automation-id*="Label"]');
        if (near && near !== el) return clip(near.textContent, 200);
    }
    const prev = el.previousElementSibling;
    if (prev) {
        const text = clip(prev.textContent, 200);
        if (text && text.length < 80) return text;
    }
    return clip(attr(el, 'placeholder'), 200);
};

document.querySelectorAll('form').forEach((form, i) => {
    if (i >= MAX_FORMS) return;
    out.forms.push({ index: i, id: form.id || '', name: attr(form, 'name'), action: form.action || '', method: form.method || 'get' });
});

for (const tag of ['input', 'textarea', 'select']) {
    document.querySelectorAll(tag).forEach(el => {
        if (out.inputs.length >= MAX_INPUTS) return;
        const type = el.type || '';
        if (['hidden', 'submit', 'button', 'image', 'reset'].includes(type)) return;
        if (type !== 'file' && !visible(el)) return;
        const entry = {
            tag, id: el.id || '', name: el.name || '',
            type: type || (tag === 'input' ? 'text' : tag),
            label: labelOf(el),
            placeholder: attr(el, 'placeholder'),
            'aria-label': attr(el, 'aria-label'),
            'data-automation-id': attr(el, 'data-automation-id'),
            required: !!el.required || el.hasAttribute('aria-required'),
            value: el.value || '',
            options: [],
        };
        if (type === 'checkbox' || type === 'radio') entry.checked = el.checked;
        if (tag === 'select') {
            Array.from(el.options).slice(0, MAX_OPTIONS).forEach(o => {
                if (o.text.trim()) entry.options.push({ value: o.value || '', text: o.text.trim() });
            });
        }
        out.inputs.push(entry);
    });
}

document.querySelectorAll('[role="radiogroup"]').forEach(group => {
    if (out.inputs.length >= MAX_INPUTS || !visible(group)) return;
    const legend = group.querySelector('legend');
    const label = legend ? clip(legend.textContent, 200) : clip(attr(group, 'aria-label') || (group.previousElementSibling || {}).textContent, 200);
    const options = [];
    group.querySelectorAll('[role="radio"], label').forEach(o => {
        const text = clip(o.textContent || attr(o, 'aria-label'), 50);
        if (text && !options.some(x => x.text === text)) options.push({ value: attr(o, 'data-value') || text, text });
    });
    out.inputs.push({ tag: 'radiogroup', type: 'radiogroup', id: group.id || '', label, 'data-automation-id': attr(group, 'data-automation-id'), required: group.hasAttribute('aria-required') || label.includes('*'), options: options.slice(0, 10) });
});

document.querySelectorAll('[role="checkbox"]').forEach(cb => {
    if (out.inputs.length >= MAX_INPUTS || !visible(cb)) return;
    out.inputs.push({ tag: 'checkbox', type: 'checkbox', id: cb.id || '', label: clip(cb.textContent || attr(cb, 'aria-label'), 200), 'data-automation-id': attr(cb, 'data-automation-id'), checked: attr(cb, 'aria-checked') === 'true', required: cb.hasAttribute('aria-required') });
});

const seen = new Set(out.inputs.map(i => i['data-automation-id']).filter(Boolean));
document.querySelectorAll('[role="combobox"], [role="listbox"], button[aria-haspopup="listbox"], [data-automation-id*="selectInputContainer"], [data-automation-id*="multiselectInputContainer"]').forEach(el => {
    if (out.inputs.length >= MAX_INPUTS || !visible(el) || el.tagName === 'SELECT') return;
    const automationId = attr(el, 'data-automation-id');
    if (automationId && seen.has(automationId)) return;
    if (automationId) seen.add(automationId);
    const label = labelOf(el);
    out.inputs.push({ tag: 'custom_dropdown', type: 'custom_dropdown', id: el.id || '', label, 'aria-label': attr(el, 'aria-label'), 'data-automation-id': automationId, value: clip(el.textContent || attr(el, 'value'), 100), required: el.hasAttribute('aria-required') || label.includes('*'), options: [] });
});

document.querySelectorAll('button, input[type="submit"], input[type="button"], [role="button"]').forEach(el => {
    if (out.buttons.length >= MAX_BUTTONS || !visible(el)) return;
    out.buttons.push({
        tag: el.tagName.toLowerCase(), id: el.id || '', name: attr(el, 'name'), type: el.type || 'button',
        text: clip(el.textContent || el.value || attr(el, 'aria-label'), 100),
        'aria-label': attr(el, 'aria-label'),
        'data-automation-id': attr(el, 'data-automation-id'),
        'data-testid': attr(el, 'data-testid'),
    });
});
return out;"#;
