mod common;

use common::Site;

const BLOG: &str = "\
taginator = tags
{
\ttags = rust go
\tPost one
}
{
\ttags = Rust
\tPost two
}
";

#[test]
fn original_page_renders_everything_and_schedules_each_tag() {
    let mut site = Site::new().file("blog/index.x", BLOG);
    assert_eq!(site.render("blog/index.x"), "Post onePost two");

    let urls: Vec<String> = site
        .session
        .drain_generated()
        .into_iter()
        .map(|(url, _)| url)
        .collect();
    assert_eq!(urls, ["/blog/tag/go", "/blog/tag/rust"]);
}

#[test]
fn clones_keep_only_matching_content() {
    let mut site = Site::new().file("blog/index.x", BLOG);
    site.render("blog/index.x");
    let clones = site.session.drain_generated();

    let rendered: Vec<String> = clones
        .iter()
        .map(|(_, page)| site.render_page(page))
        .collect();
    assert_eq!(rendered, ["Post one", "Post onePost two"]);
    assert!(site.session.drain_generated().is_empty());
}

#[test]
fn clones_see_the_active_tag() {
    let page = "\
taginator = tags
tags = news
if %taginator.active {
\t%taginator.tag_name at %page.url
}
else {
\tall: %taginator.all_tags
}
";
    let mut site = Site::new().file("notes/post.x", page);
    assert_eq!(site.render("notes/post.x"), "all: news");

    let clones = site.session.drain_generated();
    assert_eq!(clones.len(), 1);
    assert_eq!(clones[0].0, "/notes/post/tag/news");
    assert_eq!(
        site.render_page(&clones[0].1),
        "news at /notes/post/tag/news"
    );
}

#[test]
fn tags_are_collected_through_imports() {
    let index = "taginator = tags\n[import] = <p>%title</p>\n~ blog/one\n~ blog/two\n";
    let mut site = Site::new()
        .file("blog/index.x", index)
        .file("blog/one.x", "tags = rust\ntitle = One\n")
        .file("blog/two.x", "tags = go\ntitle = Two\n");

    assert_eq!(site.render("blog/index.x"), "<p>One</p><p>Two</p>");
    let clones = site.session.drain_generated();
    let rendered: Vec<(String, String)> = clones
        .iter()
        .map(|(url, page)| (url.clone(), site.render_page(page)))
        .collect();
    assert_eq!(
        rendered,
        [
            ("/blog/tag/go".to_string(), "<p>Two</p>".to_string()),
            ("/blog/tag/rust".to_string(), "<p>One</p>".to_string()),
        ]
    );
}

#[test]
fn rendering_twice_does_not_reschedule() {
    let mut site = Site::new().file("blog/index.x", BLOG);
    site.render("blog/index.x");
    assert_eq!(site.session.drain_generated().len(), 2);
    site.render("blog/index.x");
    assert!(site.session.drain_generated().is_empty());
}

#[test]
fn pages_without_a_taginator_schedule_nothing() {
    let mut site = Site::new().file("blog/index.x", "tags = rust\nhello\n");
    assert_eq!(site.render("blog/index.x"), "hello");
    assert!(site.session.drain_generated().is_empty());
}
