use retrieval::tokenizer::{Script, TermStrategy, Tokenizer, WhitespaceStrategy};
use retrieval::TokenizerConfig;
use std::io::Write;

#[test]
fn it_splits_space_delimited_text_like_str_split() {
    let t = Tokenizer::default();
    let text = " alpha  beta\t\tgamma \n delta ";
    let expected: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    assert_eq!(t.tokenize(text), expected);
    assert_eq!(WhitespaceStrategy.segment("a  b"), vec!["a", "b"]);
}

#[test]
fn it_segments_chinese_with_the_dictionary() {
    let t = Tokenizer::default();
    let text = "我爱北京天安门";
    assert_eq!(Script::classify(text), Script::Logographic);
    let words = t.tokenize(text);
    assert!(words.contains(&"北京".to_string()));
    assert!(words.contains(&"天安门".to_string()));
    assert_eq!(words.concat(), text);
}

#[test]
fn it_drops_whitespace_segments_in_mixed_text() {
    let t = Tokenizer::default();
    let words = t.tokenize("hello 世界 foo");
    assert!(words.iter().all(|w| !w.trim().is_empty()));
    assert!(words.contains(&"hello".to_string()));
    assert!(words.contains(&"foo".to_string()));
}

#[test]
fn it_is_deterministic() {
    let t = Tokenizer::default();
    let text = "南京市长江大桥 and the river";
    assert_eq!(t.tokenize(text), t.tokenize(text));
}

#[test]
fn it_uses_the_user_dictionary() {
    let word = "量子纠缠计算机";
    let baseline = Tokenizer::default().tokenize(word);
    assert!(baseline.len() > 1, "baseline should split {word}: {baseline:?}");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{word} 1000000 n").unwrap();
    let t = Tokenizer::new(&TokenizerConfig::with_user_dict(file.path()));
    assert_eq!(t.tokenize(word), vec![word.to_string()]);
}

#[test]
fn it_survives_a_missing_user_dictionary() {
    let t = Tokenizer::new(&TokenizerConfig::with_user_dict("/nonexistent/dir/userdict.txt"));
    let words = t.tokenize("我爱北京天安门");
    assert!(words.contains(&"北京".to_string()));
}
