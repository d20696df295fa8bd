mod test_download_completes;
mod test_download_requires_offer;
