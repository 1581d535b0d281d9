mod common;

use std::path::PathBuf;

use bobbin::ast::{ImageFormat, ImageSettings, PathType};
use bobbin::engine::Options;
use common::Site;

fn fixture() -> Site {
    Site::new()
        .file("about.x", "About\n")
        .file("blog/post.x", "Post\n")
        .file("img/cat.png", "")
        .file("_drafts/wip.x", "Soon\n")
        .file("style.css", "")
}

#[test]
fn pages_link_without_extension() {
    let mut site = fixture();
    assert_eq!(site.render_source("%{about}\n"), "/about");
    assert_eq!(site.render_source("%{page post}\n"), "/blog/post");
    assert!(site.files.is_used("about.x"));
    assert!(site.files.is_used("blog/post.x"));
}

#[test]
fn static_files_keep_their_extension() {
    let mut site = fixture();
    assert_eq!(site.render_source("%{static style.css}\n"), "/style.css");
}

#[test]
fn path_types_can_be_chosen_per_finder() {
    let mut site = fixture();
    assert_eq!(
        site.render_source("%{page:abs about}\n"),
        "https://example.com/about"
    );

    let mut site = fixture().file("blog/entry.x", "%{:rel about} %{:rel post}\n");
    assert_eq!(site.render("blog/entry.x"), "../about post");
}

#[test]
fn the_site_path_mode_is_the_default() {
    let mut site = Site::with_options(Options {
        path_mode: PathType::Absolute,
        ..Options::default()
    })
    .file("about.x", "");
    assert_eq!(site.render_source("%{about}\n"), "https://example.com/about");
}

#[test]
fn external_urls_pass_through() {
    let mut site = fixture();
    assert_eq!(
        site.render_source("%{https://example.org/x}\n"),
        "https://example.org/x"
    );
    assert_eq!(site.failures(), 0);
}

#[test]
fn missing_resources_are_reported_but_rendering_continues() {
    let mut site = fixture();
    assert_eq!(site.render_source("%{nowhere}\nafter\n"), "after");
    assert_eq!(site.codes(), ["bobbin::render::resource_not_found"]);
}

#[test]
fn kind_restricts_what_a_finder_may_match() {
    let mut site = fixture();
    site.render_source("%{image about}\n");
    assert_eq!(site.codes(), ["bobbin::render::resource_not_found"]);
}

#[test]
fn linking_a_draft_is_a_failure() {
    let mut site = fixture();
    assert_eq!(site.render_source("%{wip}\n"), "/_drafts/wip");
    assert_eq!(site.codes(), ["bobbin::render::draft_linked"]);
}

#[test]
fn image_settings_register_a_conversion() {
    let mut site = fixture();
    assert_eq!(
        site.render_source("%{image cat.png 800x webp}\n"),
        "/img/cat_800.webp"
    );

    let jobs = site.session.image_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].source, PathBuf::from("img/cat.png"));
    assert_eq!(jobs[0].output, PathBuf::from("img/cat_800.webp"));
    assert_eq!(
        jobs[0].settings,
        ImageSettings {
            quality: 100,
            max_size: 800,
            format: Some(ImageFormat::Webp),
        }
    );
    assert!(!site.files.is_used("img/cat.png"));
}

#[test]
fn quality_alone_gives_each_conversion_its_own_file() {
    let mut site = fixture();
    assert_eq!(
        site.render_source("%{image cat.png 40}\n%{image cat.png 90}\n"),
        "/img/cat_q40.png/img/cat_q90.png"
    );

    let outputs: Vec<PathBuf> = site
        .session
        .image_jobs()
        .iter()
        .map(|job| job.output.clone())
        .collect();
    assert_eq!(
        outputs,
        [
            PathBuf::from("img/cat_q40.png"),
            PathBuf::from("img/cat_q90.png")
        ]
    );
    assert!(outputs.iter().all(|output| output != &PathBuf::from("img/cat.png")));
}

#[test]
fn plain_images_link_to_the_source() {
    let mut site = fixture();
    assert_eq!(site.render_source("%{image cat.png}\n"), "/img/cat.png");
    assert!(site.files.is_used("img/cat.png"));
    assert!(site.session.image_jobs().is_empty());
}

#[test]
fn finders_can_feed_loops() {
    let mut site = fixture();
    assert_eq!(
        site.render_source("for %{about} {\n\t<a href=\"%it\">x</a>\n}\n"),
        "<a href=\"/about\">x</a>"
    );
}
