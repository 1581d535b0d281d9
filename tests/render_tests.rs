mod common;

use bobbin::engine::Options;
use bobbin::host::{ScriptAccessors, ScriptSandbox};
use bobbin::runtime::inline::InlineRules;
use common::{render, Site};

// ============================================================================
// DECLARATIONS AND SCOPE
// ============================================================================

#[test]
fn declared_values_render_where_referenced() {
    assert_eq!(render("title = Hello World\n%title\n"), "Hello World");
}

#[test]
fn undeclared_variables_render_empty() {
    let mut site = Site::new();
    assert_eq!(site.render_source("before %nothing after\n"), "before  after");
    assert_eq!(site.warnings() + site.failures(), 0);
}

#[test]
fn modifiers_transform_values() {
    assert_eq!(
        render("name = hello world\n%name:upper %name:t %name:slug\n"),
        "HELLO WORLD Hello World hello-world"
    );
}

#[test]
fn inner_blocks_shadow_outer_values() {
    let page = "title = Outer\n{\n\ttitle = Inner\n\t%title\n}\n%title\n";
    assert_eq!(render(page), "InnerOuter");
}

#[test]
fn unset_hides_a_value_until_the_block_ends() {
    let page = "title = Outer\n{\n\tbefore %title\n\t*title\n\tinside %title\n}\nafter %title\n";
    assert_eq!(render(page), "before Outerinside after Outer");
}

#[test]
fn lazy_and_immediate_declarations() {
    let page = "name = first\nlazy = %name\nnow := %name\nname = second\n%lazy %now\n";
    assert_eq!(render(page), "second first");
}

#[test]
fn page_variables_are_bound() {
    let mut site = Site::new().file("blog/post.x", "%page.url %page.url_canonical\n");
    assert_eq!(
        site.render("blog/post.x"),
        "/blog/post https://example.com/blog/post"
    );
}

// ============================================================================
// WRAPPERS
// ============================================================================

#[test]
fn default_wraps_paragraphs() {
    assert_eq!(
        render("[default] = <p>%%</p>\nHello there\n"),
        "<p>Hello there</p>"
    );
}

#[test]
fn token_templates_wrap_their_lines() {
    assert_eq!(render("[#] = <h1>%%</h1>\n# Title\n"), "<h1>Title</h1>");
}

#[test]
fn consecutive_tokens_share_a_group_wrapper() {
    let page = "[-] = <li>%%</li>\n{-} = <ul>%%</ul>\n- one\n- two\n- three\n";
    assert_eq!(render(page), "<ul><li>one</li><li>two</li><li>three</li></ul>");
}

#[test]
fn group_wrappers_apply_without_a_line_template() {
    let mut site = Site::new();
    assert_eq!(site.render_source("{-} = <ul>%%</ul>\n- a\n- b\n"), "<ul>ab</ul>");
    assert_eq!(
        site.codes(),
        [
            "bobbin::render::missing_token_template",
            "bobbin::render::missing_token_template"
        ]
    );
}

#[test]
fn untemplated_tokens_warn_and_pass_through() {
    let mut site = Site::new();
    assert_eq!(site.render_source("# Title\n"), "Title");
    assert_eq!(site.codes(), ["bobbin::render::missing_token_template"]);
}

#[test]
fn stop_lines_pass_through_silently() {
    let mut site = Site::new();
    assert_eq!(site.render_source(". <b>kept</b>\n"), "<b>kept</b>");
    assert_eq!(site.warnings(), 0);
}

#[test]
fn block_templates_take_indexed_arguments() {
    let page = "[link] = <a href=\"%1\">%2</a>\nlink { \"/about\" \"About us\" }\n";
    assert_eq!(render(page), "<a href=\"/about\">About us</a>");
}

#[test]
fn one_line_blocks_drop_the_space_before_the_brace() {
    assert_eq!(render("[w] = [%%]\nw { X }\n"), "[X]");
    assert_eq!(render("[w] = [%%]\nx = X\nw { %x }\n"), "[X]");
}

#[test]
fn missing_arguments_warn() {
    let mut site = Site::new();
    let html = site.render_source("[link] = <a href=\"%1\">%2</a>\nlink { only }\n");
    assert_eq!(html, "<a href=\"only\"></a>");
    assert_eq!(site.codes(), ["bobbin::render::not_enough_arguments"]);
}

#[test]
fn unique_slugs_do_not_repeat_within_a_page() {
    let page = "[##] = <h2 id=\"%%:uslug\">%%</h2>\n## Intro\n## Intro\n";
    assert_eq!(
        render(page),
        "<h2 id=\"intro\">Intro</h2><h2 id=\"intro-1\">Intro</h2>"
    );
}

#[test]
fn inline_rules_apply_to_wrapped_lines() {
    let mut inline = InlineRules::new();
    inline.push(r"\*(.+?)\*", "<em>$1</em>").unwrap();
    let mut site = Site::with_options(Options {
        inline,
        ..Options::default()
    });
    assert_eq!(
        site.render_source("[default] = <p>%%</p>\nsome *soft* text\n"),
        "<p>some <em>soft</em> text</p>"
    );
}

// ============================================================================
// CONTROL FLOW
// ============================================================================

#[test]
fn if_and_else_pick_one_branch() {
    let body = "if %title {\n\tyes\n}\nelse {\n\tno\n}\n";
    assert_eq!(render(&format!("title = T\n{body}")), "yes");
    assert_eq!(render(body), "no");
}

#[test]
fn alternatives_and_conjunctions() {
    assert_eq!(render("b = 1\nif %a | %b {\n\thit\n}\n"), "hit");
    assert_eq!(render("a = 1\nif %a + %b {\n\thit\n}\n"), "");
    assert_eq!(render("a = 1\nif %a + !%b {\n\thit\n}\n"), "hit");
}

#[test]
fn loops_bind_it_and_last() {
    let page = "items = one two three\nfor %items {\n\t%it\n\tif !%last {\n\t\t<br>\n\t}\n}\n";
    assert_eq!(render(page), "one<br>two<br>three");
}

#[test]
fn loop_bodies_can_be_wrapped() {
    let page = "[list] = <ul>%%</ul>\nitems = a \"b c\"\nfor %items list {\n\t<li>%it</li>\n}\n";
    assert_eq!(render(page), "<ul><li>a</li><li>b c</li></ul>");
}

#[test]
fn empty_loops_render_nothing() {
    assert_eq!(render("for %missing {\n\tx\n}\n"), "");
}

// ============================================================================
// TEMPLATES AND PARTIALS
// ============================================================================

#[test]
fn templates_with_a_body_wrap_the_page() {
    let mut site = Site::new().template("main", "<main>%%</main>\n");
    assert_eq!(site.render_source("& main\nHello\n"), "<main>Hello</main>");
}

#[test]
fn page_declarations_beat_template_defaults() {
    let template = "title = Untitled\n<h1>%title</h1>\n<div>%%</div>\n";
    let mut site = Site::new().template("main", template);
    assert_eq!(
        site.render_source("& main\ntitle = Mine\nBody\n"),
        "<h1>Mine</h1><div>Body</div>"
    );
    assert_eq!(
        site.render_source("& main\nBody\n"),
        "<h1>Untitled</h1><div>Body</div>"
    );
}

#[test]
fn bodiless_templates_only_declare() {
    let mut site = Site::new().template("base", "title = Base Title\n");
    assert_eq!(site.render_source("& base\n%title\n"), "Base Title");
    assert_eq!(site.render_source("title = Mine\n& base\n%title\n"), "Mine");
}

#[test]
fn missing_templates_fail() {
    let mut site = Site::new();
    assert_eq!(site.render_source("& nowhere\ntext\n"), "");
    assert_eq!(site.codes(), ["bobbin::render::missing_template"]);
}

#[test]
fn partials_see_the_caller_scope() {
    let mut site = Site::new().partial("footer", "<footer>%year</footer>\n");
    assert_eq!(site.render_source("year = 2024\n> footer\n"), "<footer>2024</footer>");
}

#[test]
fn partials_fall_back_to_source_files() {
    let mut site = Site::new()
        .file("snippets/note.html", "<aside>note</aside>")
        .file("snippets/card.x", "title = Card\n<b>%title</b>\n");
    assert_eq!(site.render_source("> note\n"), "<aside>note</aside>");
    assert_eq!(site.render_source("> card\n"), "<b>Card</b>");
}

#[test]
fn missing_partials_fail() {
    let mut site = Site::new();
    site.render_source("> nowhere\n");
    assert_eq!(site.codes(), ["bobbin::render::missing_partial"]);
}

#[test]
fn slots_outside_a_wrapper_fail() {
    let mut site = Site::new().partial("p", "x %% y\n");
    assert_eq!(site.render_source("> p\n"), "x ");
    assert_eq!(site.codes(), ["bobbin::render::no_anonymous_content"]);
}

#[test]
fn runaway_recursion_is_a_failure() {
    let mut site = Site::with_options(Options {
        max_depth: 32,
        ..Options::default()
    })
    .partial("again", "> again\n");
    assert_eq!(site.render_source("> again\n"), "");
    assert_eq!(site.codes(), ["bobbin::render::recursion_limit"]);
}

// ============================================================================
// IMPORTS
// ============================================================================

fn blog() -> Site {
    Site::new()
        .file("blog/post.x", "title = My Post\nsummary = Short\n")
        .file("blog/other.x", "title = Other\n")
}

#[test]
fn imports_render_the_import_template() {
    let mut site = blog();
    let html = site.render_source("[import] = <a href=\"%import.url\">%title</a>\n~ blog/post\n");
    assert_eq!(html, "<a href=\"/blog/post\">My Post</a>");
    assert!(site.files.is_used("blog/post.x"));
}

#[test]
fn imports_can_name_their_template() {
    let mut site = blog();
    assert_eq!(
        site.render_source("[card] = <b>%title</b> %path\n~ blog/other card\n"),
        "<b>Other</b> blog/other"
    );
}

#[test]
fn imported_values_do_not_leak() {
    let mut site = blog();
    assert_eq!(
        site.render_source("[import] = %summary\n~ blog/post\n[%summary]\n"),
        "Short[]"
    );
}

#[test]
fn unresolved_imports_do_not_stop_the_page() {
    let mut site = blog();
    let html = site.render_source("[import] = %title\n~ nowhere\nafter\n");
    assert_eq!(html, "after");
    assert_eq!(site.codes(), ["bobbin::render::import_not_found"]);
}

#[test]
fn imports_need_a_template() {
    let mut site = blog();
    site.render_source("~ blog/post\n");
    assert_eq!(site.codes(), ["bobbin::render::missing_import_template"]);
}

// ============================================================================
// SCRIPTS
// ============================================================================

/// Runs `greet`, `toc` and `broken` without a real engine.
struct FakeScripts;

impl ScriptSandbox for FakeScripts {
    fn load(&self, name: &str) -> Option<String> {
        matches!(name, "greet" | "toc" | "broken").then(String::new)
    }

    fn call(
        &self,
        name: &str,
        _source: &str,
        args: &[String],
        accessors: &mut dyn ScriptAccessors,
    ) -> Result<String, String> {
        match name {
            "greet" => Ok(format!("Hello {} ({})", accessors.get("name"), args.join(","))),
            "toc" => Ok(accessors
                .get_token(1, &["##"])
                .into_iter()
                .map(|t| t.text)
                .collect::<Vec<_>>()
                .join("|")),
            _ => Err("boom".into()),
        }
    }
}

fn run_scripts(site: &mut Site, text: &str) -> String {
    let page = site.session.page_from_source("index.x", text);
    site.session.render_page(&page, &site.files, &FakeScripts)
}

#[test]
fn scripts_read_the_caller_scope() {
    let mut site = Site::new();
    assert_eq!(
        run_scripts(&mut site, "name = World\n$ greet loud \"very much\"\n"),
        "Hello World (loud,very much)"
    );
}

#[test]
fn scripts_can_list_token_lines() {
    let mut site = Site::new();
    let html = run_scripts(&mut site, "[##] = <h2>%%</h2>\n## One\n## Two\n$ toc\n");
    assert_eq!(html, "<h2>One</h2><h2>Two</h2>One|Two");
}

#[test]
fn script_errors_are_recoverable() {
    let mut site = Site::new();
    assert_eq!(run_scripts(&mut site, "$ broken\nafter\n"), "after");
    assert_eq!(site.codes(), ["bobbin::render::script_failed"]);
}

#[test]
fn unknown_scripts_fail() {
    let mut site = Site::new();
    site.render_source("$ nowhere\n");
    assert_eq!(site.codes(), ["bobbin::render::missing_script"]);
}
