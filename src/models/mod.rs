mod category;
mod collection;
mod post;
mod recipe;
mod review;
mod user;

pub use category::RecipeCategory;
pub use collection::RecipeCollection;
pub use post::{CommunityPost, PostComment};
pub use recipe::{Recipe, ReviewStats};
pub use review::{Review, MAX_RATING, MIN_RATING};
pub use user::UserProfile;
