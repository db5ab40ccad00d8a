//! Stylesheet post-processing.
//!
//! The converter's inlined stylesheets would restyle the whole page, so rules
//! for typography, lists, the notebook root and media queries are dropped
//! line by line before the styles are prepended to the body.

/// Selectors whose rules would override the host theme
pub const EXCLUDED_SELECTORS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "a", "ul", "ol", ".rendered_html", "@media",
];

/// Fixes for notebook layout quirks, appended after the filtered styles
pub const SUPPLEMENTAL_CSS: &str = r##"
<style type="text/css">

div.input_area {
    border: none;
    background: none;
    margin-left: 6px;
}

.cell {
    font-size: 14px;
}

pre.ipynb {
    padding: 3px 9.5px;
    font-size: 14px;
}

div.output_subarea {
    padding: 3px 0;
}

div.output_stderr pre {
    background: #fdd;
}

/* Forcing DataFrame table styles */
table.dataframe {
    font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif;
    font-size: 14px;
    line-height: 20px;
}

table.dataframe th, td {
    padding: 4px;
    text-align: left;
}

.anchor-link {
    display: none;
}

@media print{*{text-shadow:none !important;color:#000 !important;background:transparent !important;box-shadow:none !important;} a,a:visited{text-decoration:underline;} a[href]:after{content:" (" attr(href) ")";} abbr[title]:after{content:" (" attr(title) ")";} .ir a:after,a[href^="javascript:"]:after,a[href^="#"]:after{content:"";} pre,blockquote{border:1px solid #999;page-break-inside:avoid;} thead{display:table-header-group;} tr,img{page-break-inside:avoid;} img{max-width:100% !important;} @page {margin:0.5cm;}p,h2,h3{orphans:3;widows:3;} h2,h3{page-break-after:avoid;}}

</style>
"##;

/// Returns true if `line` starts a rule for one of the excluded selectors.
///
/// A selector only matches as a whole token, so `pre` or `article` are not
/// mistaken for `p` and `a`.
pub fn is_excluded(line: &str) -> bool {
    let line = line.trim_start();
    EXCLUDED_SELECTORS.iter().any(|selector| {
        line.strip_prefix(*selector).is_some_and(|rest| {
            !rest
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
    })
}

/// Drop excluded lines from `css` and wrap the rest in a `<style>` block.
pub fn filter_stylesheet(css: &str) -> String {
    let kept: Vec<&str> = css.lines().filter(|line| !is_excluded(line)).collect();
    format!("<style type=\"text/css\">{}</style>", kept.join("\n"))
}

/// Filtered inlined stylesheets followed by [`SUPPLEMENTAL_CSS`].
pub fn build_styles<S: AsRef<str>>(inlined: &[S]) -> String {
    let mut css = inlined
        .iter()
        .map(|fragment| filter_stylesheet(fragment.as_ref()))
        .collect::<Vec<_>>()
        .join("\n");
    css.push_str(SUPPLEMENTAL_CSS);
    css
}
