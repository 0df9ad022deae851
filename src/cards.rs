//! Card catalogs and random draws
//!
//! Owns the static word-card and image-card decks. A draw picks one of each
//! independently and uniformly, with replacement across sessions; the decks
//! themselves are never mutated.

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use url::Url;

/// A single word card from the static deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordCard {
    pub id: u32,
    pub text: &'static str,
}

/// A single abstract image card from the static deck
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCard {
    pub id: u32,
    pub image_url: String,
}

/// The pair of cards a session is built on
///
/// Created once per session at draw time and immutable afterwards;
/// a redraw replaces the whole session state, including this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawResult {
    pub word: WordCard,
    pub image: ImageCard,
}

const fn word(id: u32, text: &'static str) -> WordCard {
    WordCard { id, text }
}

/// The OH word deck, 88 cards.
pub static WORD_CARDS: [WordCard; 88] = [
    word(1, "改变"),
    word(2, "分享"),
    word(3, "犹豫"),
    word(4, "执着"),
    word(5, "罪恶感"),
    word(6, "喜悦"),
    word(7, "习惯"),
    word(8, "希望"),
    word(9, "强迫"),
    word(10, "付出"),
    word(11, "压抑"),
    word(12, "焦虑"),
    word(13, "欢笑"),
    word(14, "吸引"),
    word(15, "陌生人"),
    word(16, "谎言"),
    word(17, "同性恋"),
    word(18, "孩童"),
    word(19, "开始"),
    word(20, "痛苦"),
    word(21, "尴尬"),
    word(22, "奴隶"),
    word(23, "羞辱"),
    word(24, "父亲"),
    word(25, "色情"),
    word(26, "威胁"),
    word(27, "攻击"),
    word(28, "疲倦"),
    word(29, "裸体"),
    word(30, "专家"),
    word(31, "恐惧"),
    word(32, "权力游戏"),
    word(33, "梦想"),
    word(34, "应该"),
    word(35, "生气"),
    word(36, "女人"),
    word(37, "受害者"),
    word(38, "道歉"),
    word(39, "丑陋"),
    word(40, "破坏"),
    word(41, "攫取"),
    word(42, "混乱"),
    word(43, "不喜欢"),
    word(44, "上司"),
    word(45, "憎恶"),
    word(46, "感情"),
    word(47, "母亲"),
    word(48, "敌对"),
    word(49, "依赖"),
    word(50, "危险"),
    word(51, "循环"),
    word(52, "幻想"),
    word(53, "羞愧"),
    word(54, "弄巧成拙"),
    word(55, "恐吓"),
    word(56, "丢脸"),
    word(57, "男性"),
    word(58, "躲藏"),
    word(59, "顺应"),
    word(60, "错误"),
    word(61, "诙谐"),
    word(62, "退省"),
    word(63, "失败"),
    word(64, "腐朽"),
    word(65, "停止"),
    word(66, "爱情"),
    word(67, "放开"),
    word(68, "姿态"),
    word(69, "成功"),
    word(70, "厌烦"),
    word(71, "哀伤"),
    word(72, "愚蠢"),
    word(73, "憎恨"),
    word(74, "固执"),
    word(75, "亏欠"),
    word(76, "外表"),
    word(77, "消除"),
    word(78, "奇妙"),
    word(79, "抗拒"),
    word(80, "等候"),
    word(81, "坚定"),
    word(82, "前进"),
    word(83, "家"),
    word(84, "违背"),
    word(85, "夸赞"),
    word(86, "聪明"),
    word(87, "孤独"),
    word(88, "游戏"),
];

/// The abstract image deck, 88 cards.
///
/// Locators are seeded so that a given card id always resolves to the same
/// image across runs.
pub static IMAGE_CARDS: Lazy<Vec<ImageCard>> = Lazy::new(|| {
    (1..=88u32)
        .map(|id| ImageCard {
            id,
            image_url: format!("https://picsum.photos/seed/{}/300/450", id + 99),
        })
        .collect()
});

/// Validate the catalogs at startup
///
/// An empty deck, a duplicated id, or an unparsable image locator is a fatal
/// configuration error; `draw` relies on these checks and has no failure mode
/// of its own.
pub fn validate_catalogs() -> Result<(), ConfigError> {
    validate_word_deck(&WORD_CARDS)?;
    validate_image_deck(IMAGE_CARDS.as_slice())
}

fn validate_word_deck(deck: &[WordCard]) -> Result<(), ConfigError> {
    if deck.is_empty() {
        return Err(ConfigError::Catalog("word deck is empty".into()));
    }
    let mut ids = HashSet::new();
    for card in deck {
        if card.text.trim().is_empty() {
            return Err(ConfigError::Catalog(format!("word card {} is blank", card.id)));
        }
        if !ids.insert(card.id) {
            return Err(ConfigError::Catalog(format!("duplicate word card id {}", card.id)));
        }
    }
    Ok(())
}

fn validate_image_deck(deck: &[ImageCard]) -> Result<(), ConfigError> {
    if deck.is_empty() {
        return Err(ConfigError::Catalog("image deck is empty".into()));
    }
    let mut ids = HashSet::new();
    for card in deck {
        if Url::parse(&card.image_url).is_err() {
            return Err(ConfigError::Catalog(format!(
                "image card {} has an unparsable locator: {}",
                card.id, card.image_url
            )));
        }
        if !ids.insert(card.id) {
            return Err(ConfigError::Catalog(format!("duplicate image card id {}", card.id)));
        }
    }
    Ok(())
}

/// Draw one word card and one image card, independently and uniformly.
///
/// Repeats across sessions are allowed and expected.
pub fn draw() -> DrawResult {
    let mut rng = rand::thread_rng();
    let word = *WORD_CARDS
        .choose(&mut rng)
        .expect("word deck validated non-empty at startup");
    let image = IMAGE_CARDS
        .choose(&mut rng)
        .expect("image deck validated non-empty at startup")
        .clone();
    DrawResult { word, image }
}
