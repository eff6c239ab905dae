//! Category and tag priority tables
//!
//! Each category carries its tags in crawl order: the broad, high-volume tags
//! first, then narrower ones, then brand/sponsorship-flavored tags. Categories
//! with a higher priority are crawled first.

use serde::Deserialize;

/// One crawlable category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    /// Short identifier used on the command line (e.g. "beauty").
    pub key: String,
    /// Display name written to catalog records (e.g. "Beauty").
    pub name: String,
    /// Higher is crawled first.
    pub priority: u8,
    pub tags: Vec<String>,
}

/// The set of categories a discovery run draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl CategoryTable {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn get(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Categories by descending priority; ties keep table order.
    pub fn by_priority(&self) -> Vec<&Category> {
        let mut sorted: Vec<&Category> = self.categories.iter().collect();
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
        sorted
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

fn category(key: &str, name: &str, priority: u8, tags: &[&str]) -> Category {
    Category {
        key: key.to_string(),
        name: name.to_string(),
        priority,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

impl Default for CategoryTable {
    /// Korean-market table.
    fn default() -> Self {
        Self::new(vec![
            category("beauty", "Beauty", 10, &[
                "뷰티", "메이크업", "화장품", "스킨케어", "뷰티블로거", "데일리메이크업",
                "코스메틱", "뷰티유튜버", "뷰스타그램", "립스틱", "파운데이션", "아이섀도우",
                "마스크팩", "클렌징", "톤업", "선크림", "쿠션", "로드샵", "올리브영",
                "뷰티리뷰", "화장품추천", "신상템", "겟레디윗미", "grwm",
            ]),
            category("fashion", "Fashion", 10, &[
                "패션", "오오티디", "ootd", "데일리룩", "패션스타그램", "코디", "스타일",
                "룩북", "패피", "패션피플", "자라", "무신사", "데일리코디", "출근룩",
                "캐주얼룩", "미니멀룩", "빈티지룩", "스트릿패션", "하이패션", "패션하울",
                "옷추천", "쇼핑하울", "신상", "협찬",
            ]),
            category("food", "Food & Drink", 9, &[
                "맛집", "먹스타그램", "맛스타그램", "푸드스타그램", "카페스타그램", "음식",
                "요리", "홈쿡", "레시피", "디저트", "서울맛집", "강남맛집", "홍대맛집",
                "브런치", "파스타", "한식", "일식", "중식", "베이킹", "커피", "맛집추천",
                "카페추천", "먹방", "음식리뷰", "배달음식",
            ]),
            category("lifestyle", "Lifestyle", 8, &[
                "일상", "데일리", "라이프스타일", "소통", "인스타그램", "daily", "일상스타그램",
                "셀피", "셀카", "집순이", "홈카페", "인테리어", "집꾸미기", "미니멀라이프",
                "자취생", "자취방", "신혼집", "루틴", "모닝루틴", "일상공유", "광고", "협찬",
                "리뷰", "체험단",
            ]),
            category("fitness", "Fitness", 7, &[
                "운동", "헬스", "피트니스", "헬스타그램", "운동스타그램", "fitness", "workout",
                "gym", "홈트", "필라테스", "다이어트", "바디프로필", "근육", "헬린이", "오운완",
                "눈바디", "식단", "단백질", "프로틴", "크로스핏", "운동복", "헬스장", "PT",
                "보충제", "운동기구",
            ]),
            category("travel", "Travel", 7, &[
                "여행", "여행스타그램", "국내여행", "해외여행", "trip", "travel", "휴가",
                "여행에미치다", "여행기록", "제주도", "부산여행", "강원도", "경주", "전주",
                "호캉스", "글램핑", "캠핑", "힐링", "바다", "여행추천", "숙소추천", "호텔",
                "리조트", "펜션",
            ]),
            category("parenting", "Parenting", 6, &[
                "육아", "육아스타그램", "맘스타그램", "아기", "아기스타그램", "육아일기", "엄마",
                "아빠", "baby", "신생아", "육아맘", "워킹맘", "돌아기", "이유식", "아기옷",
                "출산", "임신", "태교", "어린이집", "유아", "유아용품", "아기용품", "육아템",
                "육아추천", "아기장난감",
            ]),
            category("pet", "Pets", 6, &[
                "반려동물", "펫스타그램", "강아지", "고양이", "멍스타그램", "냥스타그램", "dog",
                "cat", "puppy", "애견", "강아지일상", "고양이일상", "댕댕이", "냥이", "펫",
                "동물", "산책", "애묘", "포메라니안", "말티즈", "펫푸드", "강아지간식",
                "고양이간식", "펫용품", "애견용품",
            ]),
            category("tech", "Technology", 5, &[
                "테크", "전자기기", "가젯", "리뷰", "언박싱", "tech", "gadget", "애플", "삼성",
                "스마트폰", "아이폰", "갤럭시", "맥북", "아이패드", "에어팟", "노트북", "카메라",
                "게임", "pc", "키보드", "신제품", "제품리뷰", "개봉기", "비교", "추천",
            ]),
        ])
    }
}
