use bobbin::syntax::{lex, FileId, TokenKind};

fn kinds(text: &str) -> Vec<TokenKind> {
    lex(FileId(0), text).iter().map(|t| t.kind).collect()
}

fn texts(text: &str) -> Vec<String> {
    lex(FileId(0), text)
        .iter()
        .map(|t| t.text.to_string())
        .collect()
}

#[test]
fn punctuation_runs_stay_whole() {
    use TokenKind::*;
    assert_eq!(kinds("### Title"), vec![NonWord, Whitespace, Word, Eof]);
    assert_eq!(texts("--- x")[0], "---");
    assert_eq!(kinds("** bold"), vec![Asterisk, Whitespace, Word, Eof]);
}

#[test]
fn single_rune_kinds_are_never_merged() {
    use TokenKind::*;
    assert_eq!(kinds("=="), vec![Equals, Equals, Eof]);
    assert_eq!(kinds("%%"), vec![Percent, Percent, Eof]);
    assert_eq!(kinds("{}"), vec![BraceOpen, BraceClose, Eof]);
}

#[test]
fn declarations_tokenize_predictably() {
    use TokenKind::*;
    assert_eq!(
        kinds("page_title = Hi\n"),
        vec![Ident, Whitespace, Equals, Whitespace, Word, Newline, Eof]
    );
    assert_eq!(
        kinds("[-] = x"),
        vec![BracketOpen, NonWord, BracketClose, Whitespace, Equals, Whitespace, Word, Eof]
    );
}

#[test]
fn multiplication_sign_and_builtins() {
    use TokenKind::*;
    assert_eq!(kinds("× title"), vec![Multiply, Whitespace, Word, Eof]);
    assert_eq!(kinds("~ post"), vec![Tilde, Whitespace, Word, Eof]);
    assert_eq!(kinds("& main"), vec![Ampersand, Whitespace, Word, Eof]);
    assert_eq!(kinds("$ script"), vec![Dollar, Whitespace, Word, Eof]);
}

#[test]
fn unicode_letters_form_words() {
    use TokenKind::*;
    assert_eq!(kinds("héllo wörld"), vec![Word, Whitespace, Word, Eof]);
    assert_eq!(kinds("© 2024"), vec![Word, Whitespace, Number, Eof]);
}

#[test]
fn line_numbers_advance_after_each_newline() {
    let tokens = lex(FileId(0), "a\n\nb\n");
    let lines: Vec<u32> = tokens.iter().map(|t| t.span.line).collect();
    assert_eq!(lines, vec![1, 1, 2, 3, 3, 4]);
}

#[test]
fn spans_index_into_the_source() {
    let text = "x = %{image cat.png 800x}\n";
    for token in lex(FileId(3), text) {
        assert_eq!(token.span.file, FileId(3));
        assert_eq!(
            &text[token.span.start as usize..token.span.end as usize],
            token.text
        );
    }
}

#[test]
fn empty_input_is_just_eof() {
    assert_eq!(kinds(""), vec![TokenKind::Eof]);
}
