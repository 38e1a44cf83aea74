//! Turns a Jekyll post body into content ready for the platform.
//!
//! Stages run in a fixed order. Stages 1-6 are pure string rewrites, each a
//! no-op on input it has already cleaned. Stage 7 uploads images and must run
//! last so it sees the card image injected by stage 1.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::assets::AssetUploader;
use crate::config::TransformOptions;
use crate::contract::ObjectStore;
use crate::error::UploadError;
use crate::frontmatter::Post;
use crate::images::{classify, find_image_references, ImageKind};

static SITE_BASEURL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*site\.baseurl\s*\}\}").expect("baseurl pattern is valid")
});

static CLASS_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*\{:\s*\.[\w-]+(?:\s+\.[\w-]+)*\s*\}").expect("annotation pattern is valid")
});

static HIGHLIGHT_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%-?\s*highlight\s+([\w+#.-]+)[^%]*-?%\}").expect("highlight pattern is valid")
});

static HIGHLIGHT_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%-?\s*endhighlight\s*-?%\}").expect("endhighlight pattern is valid")
});

static EXTRA_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("newline pattern is valid"));

/// Stage 1: put the card image, if any, at the top of the body.
pub fn promote_card_image(body: &str, card_url: Option<&str>) -> String {
    match card_url {
        Some(url) => {
            let line = card_line(url);
            if body.starts_with(&line) {
                body.to_string()
            } else {
                format!("{line}\n\n{body}")
            }
        }
        None => body.to_string(),
    }
}

fn card_line(url: &str) -> String {
    format!("![]({url})")
}

/// Stage 2: drop `{{ site.baseurl }}` so site-rooted paths remain.
pub fn strip_site_baseurl(body: &str) -> String {
    SITE_BASEURL.replace_all(body, "").into_owned()
}

/// Stage 3: `By: <author>` at the top of the body, below a promoted card image.
pub fn add_byline(body: &str, author: Option<&str>, card_url: Option<&str>) -> String {
    let Some(author) = author else {
        return body.to_string();
    };
    let byline = format!("By: {author}\n\n");
    let (head, rest) = match card_url.map(card_line) {
        Some(line) if body.starts_with(&line) => {
            let rest = body[line.len()..].trim_start_matches('\n');
            (format!("{line}\n\n"), rest)
        }
        _ => (String::new(), body),
    };
    if rest.starts_with(&byline) || rest == byline.trim_end() {
        return body.to_string();
    }
    format!("{head}{byline}{rest}")
}

/// Stage 4: remove kramdown `{: .class }` annotations.
pub fn strip_class_annotations(body: &str) -> String {
    CLASS_ANNOTATION.replace_all(body, "").into_owned()
}

/// Stage 5: `{% highlight lang %}` / `{% endhighlight %}` to plain fences.
pub fn convert_highlight_fences(body: &str, keep_language: bool) -> String {
    let opened = if keep_language {
        HIGHLIGHT_OPEN.replace_all(body, "```$1")
    } else {
        HIGHLIGHT_OPEN.replace_all(body, "```")
    };
    HIGHLIGHT_CLOSE.replace_all(&opened, "```").into_owned()
}

/// Stage 6: at most one blank line between paragraphs.
pub fn collapse_blank_lines(body: &str) -> String {
    EXTRA_NEWLINES.replace_all(body, "\n\n").into_owned()
}

/// Stages 1-6.
pub fn rewrite(post: &Post, options: &TransformOptions) -> String {
    let card = post.card_image_url();
    let author = post.author();

    let content = promote_card_image(&post.body, card.as_deref());
    let content = strip_site_baseurl(&content);
    let content = add_byline(&content, author.as_deref(), card.as_deref());
    let content = strip_class_annotations(&content);
    let content = convert_highlight_fences(&content, options.keep_fence_language);
    collapse_blank_lines(&content)
}

/// Stage 7: upload every local image and substitute each occurrence in place.
///
/// Every occurrence is uploaded on its own, in order; a repeated path is uploaded again.
pub async fn upload_images<S: ObjectStore + ?Sized>(
    content: &str,
    uploader: &AssetUploader<'_, S>,
) -> Result<String, UploadError> {
    let references = find_image_references(content);
    let mut rewritten = String::with_capacity(content.len());
    let mut cursor = 0;
    let mut uploaded = 0usize;

    for reference in references {
        if classify(&reference.url, uploader.site_domain()) == ImageKind::External {
            debug!(url = %reference.url, "[TRANSFORM] Leaving external image in place");
            continue;
        }
        let new_url = uploader.upload(&reference.url).await?;
        rewritten.push_str(&content[cursor..reference.span.start]);
        rewritten.push_str(&new_url);
        cursor = reference.span.end;
        uploaded += 1;
    }
    rewritten.push_str(&content[cursor..]);

    info!(uploaded, "[TRANSFORM] Image pass complete");
    Ok(rewritten)
}

/// Stages 1-7: publish-ready content for `post`.
pub async fn transform<S: ObjectStore + ?Sized>(
    post: &Post,
    options: &TransformOptions,
    uploader: &AssetUploader<'_, S>,
) -> Result<String, UploadError> {
    let content = rewrite(post, options);
    upload_images(&content, uploader).await
}
