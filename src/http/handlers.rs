use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{AuthService, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::app::comments::CommentService;
use crate::app::feed::FeedService;
use crate::app::forms::{CommentFormInput, FormErrors, FormView, PostFields, PostFormInput};
use crate::app::groups::GroupService;
use crate::app::pagination::Page;
use crate::app::posts::{PostFilter, PostService};
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::comment::Comment;
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::domain::user::{AuthorProfile, User};
use crate::http::{AdminToken, AppError, AuthUser};
use crate::AppState;

const MAX_USERNAME_LEN: usize = 150;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

fn found(location: impl Into<String>) -> Response {
    AppError::redirect(location).into_response()
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

fn post_url(post_id: Uuid) -> String {
    format!("/posts/{}/", post_id)
}

/// Malformed ids name no post, so they are reported like unknown ones.
fn parse_post_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found("post not found"))
}

async fn load_post(state: &AppState, post_id: Uuid) -> Result<Post, AppError> {
    let service = PostService::new(state.db.clone());
    let post = service.get_post(post_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %post_id, "failed to fetch post");
        AppError::internal("failed to fetch post")
    })?;

    post.ok_or_else(|| AppError::not_found("post not found"))
}

async fn load_groups(state: &AppState) -> Result<Vec<Group>, AppError> {
    GroupService::new(state.db.clone())
        .list_groups()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list groups");
            AppError::internal("failed to list groups")
        })
}

async fn load_author(state: &AppState, username: &str) -> Result<User, AppError> {
    let user = UserService::new(state.db.clone())
        .get_by_username(username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username, "failed to fetch author");
            AppError::internal("failed to fetch author")
        })?;

    user.ok_or_else(|| AppError::not_found("author not found"))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let cache = state.cache.ping().await.is_ok();
    let status = if db && cache { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn not_found(uri: Uri) -> AppError {
    tracing::debug!(path = %uri.path(), "no route");
    AppError::not_found("page not found")
}

#[derive(Serialize)]
pub struct IndexContext {
    pub page_obj: Page<Post>,
}

/// The home listing is served from the listing cache, keyed by the request URI.
pub async fn index(
    uri: Uri,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let cache_key = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/")
        .to_string();

    if let Some(body) = state.cache.get(&cache_key).await {
        tracing::debug!(key = %cache_key, "index served from cache");
        return Ok(json_body(body));
    }

    let service = PostService::new(state.db.clone());
    let page = service
        .list_page(PostFilter::All, &state.paginator, query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list posts");
            AppError::internal("failed to list posts")
        })?;

    let body = serde_json::to_vec(&IndexContext { page_obj: page }).map_err(|err| {
        tracing::error!(error = ?err, "failed to serialize index");
        AppError::internal("failed to list posts")
    })?;
    let body = Bytes::from(body);

    state
        .cache
        .set(&cache_key, body.clone(), state.index_cache_ttl)
        .await;

    Ok(json_body(body))
}

fn json_body(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

#[derive(Serialize)]
pub struct GroupContext {
    pub group: Group,
    pub page_obj: Page<Post>,
}

pub async fn group_posts(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GroupContext>, AppError> {
    let group = GroupService::new(state.db.clone())
        .get_by_slug(&slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to fetch group");
            AppError::internal("failed to fetch group")
        })?
        .ok_or_else(|| AppError::not_found("group not found"))?;

    let page = PostService::new(state.db.clone())
        .list_page(
            PostFilter::Group(group.id),
            &state.paginator,
            query.page.as_deref(),
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id = %group.id, "failed to list group posts");
            AppError::internal("failed to list posts")
        })?;

    Ok(Json(GroupContext {
        group,
        page_obj: page,
    }))
}

#[derive(Serialize)]
pub struct ProfileContext {
    pub author: AuthorProfile,
    pub following: bool,
    pub page_obj: Page<Post>,
}

pub async fn profile(
    Path(username): Path<String>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfileContext>, AppError> {
    let author = UserService::new(state.db.clone())
        .profile(&username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to fetch profile");
            AppError::internal("failed to fetch profile")
        })?
        .ok_or_else(|| AppError::not_found("author not found"))?;

    let following = match &auth {
        Some(viewer) if viewer.user_id != author.id => SocialService::new(state.db.clone())
            .is_following(viewer.user_id, author.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %viewer.user_id, author_id = %author.id, "failed to check follow");
                AppError::internal("failed to fetch profile")
            })?,
        _ => false,
    };

    let page = PostService::new(state.db.clone())
        .list_page(
            PostFilter::Author(author.id),
            &state.paginator,
            query.page.as_deref(),
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %author.id, "failed to list author posts");
            AppError::internal("failed to list posts")
        })?;

    Ok(Json(ProfileContext {
        author,
        following,
        page_obj: page,
    }))
}

#[derive(Serialize)]
pub struct FeedContext {
    pub page_obj: Page<Post>,
}

pub async fn follow_index(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FeedContext>, AppError> {
    let page = FeedService::new(state.db.clone())
        .follow_index(auth.user_id, &state.paginator, query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch follow feed");
            AppError::internal("failed to fetch follow feed")
        })?;

    Ok(Json(FeedContext { page_obj: page }))
}

#[derive(Serialize)]
pub struct PostDetailContext {
    pub post: Post,
    pub author_posts_count: i64,
    pub comments: Vec<Comment>,
    pub comment_form: FormView<CommentFormInput>,
}

pub async fn post_detail(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PostDetailContext>, AppError> {
    let post_id = parse_post_id(&id)?;
    let post = load_post(&state, post_id).await?;

    let author_posts_count = UserService::new(state.db.clone())
        .count_posts(post.author.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %post.author.id, "failed to count posts");
            AppError::internal("failed to fetch post")
        })?;

    let comments = CommentService::new(state.db.clone())
        .list_for_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to list comments");
            AppError::internal("failed to fetch post")
        })?;

    Ok(Json(PostDetailContext {
        post,
        author_posts_count,
        comments,
        comment_form: FormView::blank(),
    }))
}

#[derive(Serialize)]
pub struct PostFormContext {
    pub form: FormView<PostFormInput>,
    pub is_edit: bool,
    pub groups: Vec<Group>,
}

/// A body that is not a readable form becomes a form-level error.
fn read_form<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, FormErrors> {
    body.map(|Json(input)| input).map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "unreadable form body");
        FormErrors::unreadable(rejection.body_text())
    })
}

/// The submitted values plus either the validated fields or the errors to show.
fn validate_post_form(
    body: Result<Json<PostFormInput>, JsonRejection>,
    groups: &[Group],
) -> (PostFormInput, Result<PostFields, FormErrors>) {
    match read_form(body) {
        Ok(input) => {
            let fields = input.validate(groups);
            (input, fields)
        }
        Err(errors) => (PostFormInput::default(), Err(errors)),
    }
}

pub async fn post_create_form(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostFormContext>, AppError> {
    let groups = load_groups(&state).await?;
    Ok(Json(PostFormContext {
        form: FormView::blank(),
        is_edit: false,
        groups,
    }))
}

pub async fn post_create(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<PostFormInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let groups = load_groups(&state).await?;
    let (input, fields) = validate_post_form(body, &groups);
    let fields = match fields {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(Json(PostFormContext {
                form: FormView::with_errors(input, errors),
                is_edit: false,
                groups,
            })
            .into_response());
        }
    };

    let post = PostService::new(state.db.clone())
        .create_post(auth.user_id, &fields)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    tracing::info!(post_id = %post.id, author_id = %auth.user_id, "post created");
    Ok(found(profile_url(&auth.username)))
}

pub async fn post_edit_form(
    Path(id): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&id)?;
    let post = load_post(&state, post_id).await?;
    if !post.is_authored_by(auth.user_id) {
        return Ok(found(post_url(post_id)));
    }

    let groups = load_groups(&state).await?;
    let values = PostFormInput {
        text: post.text,
        group: post.group.map(|group| group.id.to_string()),
        image: post.image,
    };

    Ok(Json(PostFormContext {
        form: FormView::with_values(values),
        is_edit: true,
        groups,
    })
    .into_response())
}

pub async fn post_edit(
    Path(id): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<PostFormInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&id)?;
    let post = load_post(&state, post_id).await?;
    if !post.is_authored_by(auth.user_id) {
        return Ok(found(post_url(post_id)));
    }

    let groups = load_groups(&state).await?;
    let (input, fields) = validate_post_form(body, &groups);
    let fields = match fields {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(Json(PostFormContext {
                form: FormView::with_errors(input, errors),
                is_edit: true,
                groups,
            })
            .into_response());
        }
    };

    let updated = PostService::new(state.db.clone())
        .update_post(post_id, auth.user_id, &fields)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    if updated.is_none() {
        tracing::warn!(post_id = %post_id, "post disappeared before update");
    }

    Ok(found(post_url(post_id)))
}

pub async fn post_delete(
    Path(id): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&id)?;
    let post = load_post(&state, post_id).await?;
    if !post.is_authored_by(auth.user_id) {
        return Ok(found(post_url(post_id)));
    }

    let deleted = PostService::new(state.db.clone())
        .delete_post(post_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to delete post");
            AppError::internal("failed to delete post")
        })?;

    if deleted {
        tracing::info!(post_id = %post_id, author_id = %auth.user_id, "post deleted");
    }

    Ok(found(profile_url(&auth.username)))
}

/// Always returns to the post; an invalid comment is dropped without a write.
pub async fn add_comment(
    Path(id): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<CommentFormInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&id)?;

    let text = match read_form(body).and_then(|input| input.validate()) {
        Ok(text) => text,
        Err(_) => {
            load_post(&state, post_id).await?;
            return Ok(found(post_url(post_id)));
        }
    };

    let comment = CommentService::new(state.db.clone())
        .create_comment(post_id, auth.user_id, &text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, user_id = %auth.user_id, "failed to comment");
            AppError::internal("failed to comment")
        })?;

    match comment {
        Some(comment) => {
            tracing::info!(comment_id = %comment.id, post_id = %post_id, "comment created");
            Ok(found(post_url(post_id)))
        }
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn profile_follow(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let author = load_author(&state, &username).await?;

    let follow = SocialService::new(state.db.clone())
        .follow(auth.user_id, author.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, author_id = %author.id, "failed to follow author");
            AppError::internal("failed to follow author")
        })?;

    if let Some(follow) = follow {
        tracing::info!(follow_id = %follow.id, user_id = %follow.user_id, author_id = %follow.author_id, "followed author");
    }

    Ok(found(profile_url(&author.username)))
}

pub async fn profile_unfollow(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let author = load_author(&state, &username).await?;

    let unfollowed = SocialService::new(state.db.clone())
        .unfollow(auth.user_id, author.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, author_id = %author.id, "failed to unfollow author");
            AppError::internal("failed to unfollow author")
        })?;

    if unfollowed {
        tracing::info!(user_id = %auth.user_id, author_id = %author.id, "unfollowed author");
    }

    Ok(found(profile_url(&author.username)))
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub access_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
}

/// Letters, digits and `@ . + - _`, at most 150 characters.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.trim().chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }
    Ok(())
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    )
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    let username = payload.username.trim();
    if !is_valid_username(username) {
        return Err(AppError::bad_request(
            "username may contain only letters, digits and @/./+/-/_ characters",
        ));
    }
    check_password(&payload.password)?;

    let service = auth_service(&state);
    let user = service
        .signup(username, payload.display_name.trim(), &payload.password)
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.code().as_deref() == Some("23505") {
                        return AppError::conflict("username already taken");
                    }
                }
            }
            tracing::error!(error = ?err, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    let token = service.issue_access_token(user.id).map_err(|err| {
        tracing::error!(error = ?err, user_id = %user.id, "failed to issue token");
        AppError::internal("failed to create user")
    })?;

    tracing::info!(user_id = %user.id, "user signed up");
    Ok(Json(AuthTokenResponse {
        user: Some(user),
        access_token: token.token,
        access_expires_at: token.expires_at,
    }))
}

#[derive(Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Serialize)]
pub struct LoginFormContext {
    pub fields: [&'static str; 2],
    pub next: Option<String>,
}

pub async fn login_form(Query(query): Query<LoginQuery>) -> Json<LoginFormContext> {
    Json(LoginFormContext {
        fields: ["username", "password"],
        next: query.next,
    })
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let token = auth_service(&state)
        .login(payload.username.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    Ok(Json(AuthTokenResponse {
        user: None,
        access_token: token.token,
        access_expires_at: token.expires_at,
    }))
}

pub async fn clear_cache(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.cache.clear().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to clear listing cache");
        AppError::internal("failed to clear cache")
    })?;

    tracing::info!("listing cache cleared");
    Ok(StatusCode::NO_CONTENT)
}
